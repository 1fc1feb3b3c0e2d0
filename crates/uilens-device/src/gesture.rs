//! Gesture geometry and key-name mapping shared by the adapters.

use std::time::Duration;

use uilens_core::{LensError, Point, Result, SwipeDirection, WindowSize};

/// Duration of a scale-relative swipe.
pub const DIRECTIONAL_SWIPE_DURATION: Duration = Duration::from_millis(100);

/// Start and end points of a swipe covering `scale` of the screen.
///
/// Horizontal swipes run along the vertical center line, vertical ones along
/// the horizontal center; `up` moves the content up (finger travels upward).
pub fn directional_swipe_path(
    direction: SwipeDirection,
    scale: f64,
    size: WindowSize,
) -> Result<(Point, Point)> {
    if !(scale > 0.0 && scale <= 1.0) {
        return Err(LensError::invalid_argument(
            "scale",
            format!("{scale} is outside (0, 1]"),
        ));
    }
    let w = size.width as f64;
    let h = size.height as f64;
    let h_offset = w * (1.0 - scale) / 2.0;
    let v_offset = h * (1.0 - scale) / 2.0;
    let center = (w / 2.0, h / 2.0);

    let (from, to) = match direction {
        SwipeDirection::Left => ((w - h_offset, center.1), (h_offset, center.1)),
        SwipeDirection::Right => ((h_offset, center.1), (w - h_offset, center.1)),
        SwipeDirection::Up => ((center.0, h - v_offset), (center.0, v_offset)),
        SwipeDirection::Down => ((center.0, v_offset), (center.0, h - v_offset)),
    };
    let point = |(x, y): (f64, f64)| Point::new(x.round() as i32, y.round() as i32);
    Ok((point(from), point(to)))
}

/// Map a friendly key name to an Android `input keyevent` argument.
/// Unknown names are passed through (raw keycodes, `KEYCODE_*` names).
pub fn android_keycode(key: &str) -> String {
    let code = match key.to_ascii_lowercase().as_str() {
        "home" => "3",
        "back" => "4",
        "call" => "5",
        "endcall" => "6",
        "up" | "dpad_up" => "19",
        "down" | "dpad_down" => "20",
        "left" | "dpad_left" => "21",
        "right" | "dpad_right" => "22",
        "center" | "dpad_center" => "23",
        "volume_up" => "24",
        "volume_down" => "25",
        "power" => "26",
        "camera" => "27",
        "tab" => "61",
        "enter" => "66",
        "delete" | "del" | "backspace" => "67",
        "menu" => "82",
        "search" => "84",
        "volume_mute" => "164",
        "recent" | "app_switch" => "187",
        "wakeup" => "224",
        "sleep" => "223",
        _ => return key.to_string(),
    };
    code.to_string()
}

/// Map a key name to a WebDriverAgent hardware button.
pub fn ios_button(key: &str) -> Result<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "home" => Ok("home"),
        "volume_up" | "volumeup" => Ok("volumeUp"),
        "volume_down" | "volumedown" => Ok("volumeDown"),
        other => Err(LensError::unsupported("ios", format!("key '{other}'"))),
    }
}
