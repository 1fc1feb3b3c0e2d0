//! Device commands with loosely-typed arguments.
//!
//! The REST routes and the WebSocket channel both build a [`DeviceCommand`]
//! and call [`DeviceCommand::dispatch`]. Arguments arrive as query-string text
//! or JSON numbers and are coerced here; defaults match what the inspector UI
//! assumes when a parameter is omitted.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use uilens_core::{Locator, LooseValue, Point, Result, SwipeDirection};

use crate::adapter::{DeviceAdapter, SHELL_TIMEOUT};

/// Reported in place of an error when an element command finds nothing.
pub const ELEMENT_MISSING_MSG: &str = "element is not exists";

fn zero() -> LooseValue {
    LooseValue::from("0")
}

fn half_second() -> LooseValue {
    LooseValue::from("0.5")
}

fn default_direction() -> String {
    "up".into()
}

fn default_scale() -> LooseValue {
    LooseValue::from("0.8")
}

fn default_key() -> String {
    "back".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TapArgs {
    #[serde(default = "zero")]
    pub x: LooseValue,
    #[serde(default = "zero")]
    pub y: LooseValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LongPressArgs {
    #[serde(default = "zero")]
    pub x: LooseValue,
    #[serde(default = "zero")]
    pub y: LooseValue,
    #[serde(default = "half_second")]
    pub duration: LooseValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwipeArgs {
    #[serde(default = "zero")]
    pub x1: LooseValue,
    #[serde(default = "zero")]
    pub y1: LooseValue,
    #[serde(default = "zero")]
    pub x2: LooseValue,
    #[serde(default = "zero")]
    pub y2: LooseValue,
    #[serde(default = "half_second")]
    pub duration: LooseValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwipeExtArgs {
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_scale")]
    pub scale: LooseValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PressArgs {
    #[serde(default = "default_key")]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellArgs {
    pub command: String,
    /// Seconds; capped at the session's shell bound.
    #[serde(default)]
    pub timeout: Option<LooseValue>,
}

/// Element address as the inspector sends it: `origin` is the locator kind,
/// `flag` the value.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementArgs {
    #[serde(alias = "kind")]
    pub origin: String,
    #[serde(alias = "value")]
    pub flag: String,
    #[serde(default)]
    pub index: Option<LooseValue>,
}

impl ElementArgs {
    pub fn locator(&self) -> Result<Locator> {
        Locator::parse(&self.origin, &self.flag, self.index.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputArgs {
    #[serde(alias = "kind")]
    pub origin: String,
    #[serde(alias = "value")]
    pub flag: String,
    #[serde(default)]
    pub index: Option<LooseValue>,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeviceCommand {
    Tap(TapArgs),
    LongPress(LongPressArgs),
    Swipe(SwipeArgs),
    SwipeExt(SwipeExtArgs),
    Press(PressArgs),
    Shell(ShellArgs),
    Exists(ElementArgs),
    Click(ElementArgs),
    Text(ElementArgs),
    Input(InputArgs),
    AppCurrent,
}

impl DeviceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Tap(_) => "tap",
            DeviceCommand::LongPress(_) => "long_press",
            DeviceCommand::Swipe(_) => "swipe",
            DeviceCommand::SwipeExt(_) => "swipe_ext",
            DeviceCommand::Press(_) => "press",
            DeviceCommand::Shell(_) => "shell",
            DeviceCommand::Exists(_) => "exists",
            DeviceCommand::Click(_) => "click",
            DeviceCommand::Text(_) => "text",
            DeviceCommand::Input(_) => "input",
            DeviceCommand::AppCurrent => "app_current",
        }
    }

    /// Coerce the arguments, run the command and shape the JSON reply.
    ///
    /// Invalid arguments fail before the device is touched.
    pub async fn dispatch(&self, device: &dyn DeviceAdapter) -> Result<Value> {
        let platform = device.platform();
        match self {
            DeviceCommand::Tap(a) => {
                let at = Point::new(a.x.to_i32("x")?, a.y.to_i32("y")?);
                device.tap(at).await?;
                info!(%platform, x = at.x, y = at.y, "tap");
                Ok(json!({"success": true}))
            }
            DeviceCommand::LongPress(a) => {
                let at = Point::new(a.x.to_i32("x")?, a.y.to_i32("y")?);
                let duration = a.duration.to_duration("duration")?;
                device.long_press(at, duration).await?;
                info!(%platform, x = at.x, y = at.y, "long press");
                Ok(json!({"success": true}))
            }
            DeviceCommand::Swipe(a) => {
                let from = Point::new(a.x1.to_i32("x1")?, a.y1.to_i32("y1")?);
                let to = Point::new(a.x2.to_i32("x2")?, a.y2.to_i32("y2")?);
                let duration = a.duration.to_duration("duration")?;
                device.swipe(from, to, duration).await?;
                info!(%platform, "swipe");
                Ok(json!({"success": true}))
            }
            DeviceCommand::SwipeExt(a) => {
                let direction = a.direction.parse::<SwipeDirection>()?;
                let scale = a.scale.to_f64("scale")?;
                device.directional_swipe(direction, scale).await?;
                info!(%platform, direction = %a.direction, scale, "directional swipe");
                Ok(json!({"success": true}))
            }
            DeviceCommand::Press(a) => {
                device.press_key(&a.key).await?;
                info!(%platform, key = %a.key, "press");
                Ok(json!({"success": true}))
            }
            DeviceCommand::Shell(a) => {
                let timeout = match &a.timeout {
                    Some(t) => t.to_duration("timeout")?,
                    None => SHELL_TIMEOUT,
                };
                let out = device.run_shell(&a.command, timeout).await?;
                Ok(json!({"result": out.output, "code": out.exit_code}))
            }
            DeviceCommand::Exists(a) => {
                let exists = device.locate(&a.locator()?).exists().await?;
                Ok(json!({"success": true, "exists": exists}))
            }
            DeviceCommand::Click(a) => {
                let element = device.locate(&a.locator()?);
                if !element.exists().await? {
                    return Ok(json!({"success": false, "msg": ELEMENT_MISSING_MSG}));
                }
                element.click().await?;
                info!(%platform, locator = %element.locator(), "element click");
                Ok(json!({"success": true}))
            }
            DeviceCommand::Text(a) => {
                let element = device.locate(&a.locator()?);
                if !element.exists().await? {
                    return Ok(json!({"success": false, "text": "", "msg": ELEMENT_MISSING_MSG}));
                }
                Ok(json!({"success": true, "text": element.text().await?}))
            }
            DeviceCommand::Input(a) => {
                let locator = Locator::parse(&a.origin, &a.flag, a.index.as_ref())?;
                let element = device.locate(&locator);
                if !element.exists().await? {
                    return Ok(json!({"success": false, "msg": ELEMENT_MISSING_MSG}));
                }
                element.set_text(&a.input).await?;
                info!(%platform, locator = %locator, "element input");
                Ok(json!({"success": true}))
            }
            DeviceCommand::AppCurrent => {
                let app = device.app_current().await?;
                Ok(json!({"success": true, "package": app.package, "activity": app.activity}))
            }
        }
    }
}
