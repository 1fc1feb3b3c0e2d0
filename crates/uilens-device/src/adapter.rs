//! The uniform capability surface every platform adapter implements.

use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use uilens_core::{
    DeviceIdentity, ElementInfo, ForegroundApp, LensError, Locator, Platform, Point, Result,
    ShellOutput, SwipeDirection, WindowSize,
};

/// Upper bound for a single `run_shell` call.
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(60);

/// Hierarchy dump plus the context the inspector needs to render it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_hierarchy: Option<String>,
    pub json_hierarchy: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    pub window_size: WindowSize,
}

/// A live device session.
///
/// Coordinates are screenshot pixels on every platform. Durations are
/// already-validated `Duration`s; loosely-typed request input is coerced by
/// [`crate::commands`] before it reaches an adapter.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Capture the screen.
    async fn screenshot(&self) -> Result<DynamicImage>;

    /// Structured JSON tree of the current UI.
    async fn dump_hierarchy(&self) -> Result<Value>;

    /// Like [`dump_hierarchy`](Self::dump_hierarchy) plus foreground app and window size.
    async fn dump_hierarchy_ext(&self) -> Result<HierarchySnapshot>;

    async fn window_size(&self) -> Result<WindowSize>;

    /// Resolve a locator into a lazily-evaluated element handle. Nothing is
    /// queried until the handle is used.
    fn locate(&self, locator: &Locator) -> Box<dyn UiElement>;

    async fn tap(&self, at: Point) -> Result<()>;

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()>;

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()>;

    /// Swipe across `scale` (0, 1] of the screen in `direction`.
    async fn directional_swipe(&self, direction: SwipeDirection, scale: f64) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Run a shell command, failing with `CommandTimeout` once `timeout`
    /// (capped at the session's shell bound) elapses.
    async fn run_shell(&self, command: &str, timeout: Duration) -> Result<ShellOutput>;

    async fn identity(&self) -> Result<DeviceIdentity>;

    async fn app_current(&self) -> Result<ForegroundApp>;

    async fn app_start(&self, package: &str, activity: Option<&str>) -> Result<()>;

    async fn install_app(&self, _path: &str) -> Result<String> {
        Err(LensError::unsupported(self.platform().as_str(), "app install"))
    }

    async fn uninstall_app(&self, _package: &str) -> Result<String> {
        Err(LensError::unsupported(self.platform().as_str(), "app uninstall"))
    }
}

/// Handle to a UI element. Every call re-queries the device.
#[async_trait]
pub trait UiElement: Send + Sync {
    fn locator(&self) -> &Locator;

    async fn exists(&self) -> Result<bool>;

    /// Current attributes; `ElementNotFound` if nothing matches.
    async fn info(&self) -> Result<ElementInfo>;

    async fn text(&self) -> Result<String> {
        Ok(self.info().await?.text)
    }

    async fn set_text(&self, text: &str) -> Result<()>;

    async fn click(&self) -> Result<()>;
}

pub(crate) fn not_found(locator: &Locator) -> LensError {
    LensError::ElementNotFound(locator.to_string())
}
