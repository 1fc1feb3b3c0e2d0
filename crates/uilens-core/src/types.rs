use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LensError;

// ─── Platform & session identity ────────────────────────────────

/// Device platform a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            _ => Err(LensError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// Registry key for one device endpoint: `platform` or `platform:address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Build the identifier for a platform and address (empty = default device).
    pub fn new(platform: Platform, address: &str) -> Self {
        if address.is_empty() {
            Self(platform.as_str().to_string())
        } else {
            Self(format!("{platform}:{address}"))
        }
    }

    /// Split a raw identifier on its first `:` into `(platform, address)`.
    ///
    /// The platform part is not validated here; `"android:127.0.0.1:5555"`
    /// yields `("android", "127.0.0.1:5555")` and `"ios"` yields `("ios", "")`.
    pub fn split(raw: &str) -> (&str, &str) {
        raw.split_once(':').unwrap_or((raw, ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ─── Geometry ───────────────────────────────────────────────────

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// Element bounds as reported by the inspector (`x`, `y`, `width`, `height`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Direction for a scale-relative swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for SwipeDirection {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            other => Err(LensError::invalid_argument(
                "direction",
                format!("expected up, down, left or right, got '{other}'"),
            )),
        }
    }
}

// ─── Device records ─────────────────────────────────────────────

/// Result of a shell command run on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutput {
    pub output: String,
    pub exit_code: i32,
}

/// The app currently in the foreground.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundApp {
    pub package: String,
    pub activity: String,
}

/// Identity metadata reported by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub serial: String,
    pub udid: String,
    pub model: String,
    #[serde(rename = "hwaddr")]
    pub hardware_address: String,
    pub port: Option<u16>,
    #[serde(rename = "sdk")]
    pub sdk_version: Option<String>,
}

/// Snapshot of a single UI element, taken at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub text: String,
    pub class_name: String,
    pub resource_id: String,
    pub description: String,
    pub bounds: Rect,
    pub selected: bool,
    pub enabled: bool,
    pub clickable: bool,
    pub focused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_formats() {
        assert_eq!(SessionId::new(Platform::Android, "").as_str(), "android");
        assert_eq!(
            SessionId::new(Platform::Android, "127.0.0.1:5555").as_str(),
            "android:127.0.0.1:5555"
        );
        assert_eq!(
            SessionId::new(Platform::Ios, "http://10.0.0.2:8100").as_str(),
            "ios:http://10.0.0.2:8100"
        );
    }

    #[test]
    fn test_session_id_split_on_first_colon() {
        assert_eq!(SessionId::split("android"), ("android", ""));
        assert_eq!(
            SessionId::split("android:127.0.0.1:5555"),
            ("android", "127.0.0.1:5555")
        );
        assert_eq!(SessionId::split("ios:"), ("ios", ""));
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("ios".parse::<Platform>().unwrap(), Platform::Ios);
        let err = "windows".parse::<Platform>().unwrap_err();
        assert!(matches!(err, LensError::UnsupportedPlatform(p) if p == "windows"));
    }

    #[test]
    fn test_identity_wire_names() {
        let id = DeviceIdentity {
            serial: "emulator-5554".into(),
            hardware_address: "02:00:00:00:00:00".into(),
            sdk_version: Some("33".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["hwaddr"], "02:00:00:00:00:00");
        assert_eq!(json["sdk"], "33");
        assert!(json["port"].is_null());
    }

    #[test]
    fn test_rect_center() {
        let r = Rect {
            x: 100,
            y: 200,
            width: 50,
            height: 20,
        };
        assert_eq!(r.center(), Point::new(125, 210));
    }

    #[test]
    fn test_swipe_direction_rejects_unknown() {
        assert_eq!("UP".parse::<SwipeDirection>().unwrap(), SwipeDirection::Up);
        assert!(matches!(
            "sideways".parse::<SwipeDirection>(),
            Err(LensError::InvalidArgument { .. })
        ));
    }
}
