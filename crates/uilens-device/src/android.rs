//! Android adapter.
//!
//! [`AndroidDevice`] implements [`DeviceAdapter`] on top of an
//! [`AndroidClient`], the narrow set of device primitives the adapter needs.
//! [`crate::adb::AdbClient`] provides them through the `adb` tool.

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use uilens_core::{
    DeviceIdentity, ElementInfo, ForegroundApp, LensError, Locator, Platform, Point, Result,
    ShellOutput, SwipeDirection, WindowSize,
};

use crate::adapter::{DeviceAdapter, HierarchySnapshot, SHELL_TIMEOUT, UiElement, not_found};
use crate::locator::{ElementQuery, resolve_android};
use crate::{capture, gesture, hierarchy};

/// Device primitives an Android adapter delegates to.
#[async_trait]
pub trait AndroidClient: Send + Sync {
    /// Raw PNG bytes. May be empty when the screen is protected.
    ///
    /// A device that answers but cannot capture reports
    /// [`LensError::Capture`]; any other error means the device itself
    /// was unreachable.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// uiautomator XML dump.
    async fn dump_hierarchy(&self) -> Result<String>;

    async fn window_size(&self) -> Result<WindowSize>;

    async fn app_current(&self) -> Result<ForegroundApp>;

    async fn app_start(&self, package: &str, activity: Option<&str>) -> Result<()>;

    async fn tap(&self, at: Point) -> Result<()>;

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()>;

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()>;

    /// Send an `input keyevent` argument (numeric code or `KEYCODE_*` name).
    async fn press_key(&self, keycode: &str) -> Result<()>;

    /// Type into the focused field.
    async fn input_text(&self, text: &str) -> Result<()>;

    /// Delete `count` characters from the focused field.
    async fn clear_text(&self, count: usize) -> Result<()>;

    /// Run a shell command. No timeout is applied here.
    async fn shell(&self, command: &str) -> Result<ShellOutput>;

    async fn device_identity(&self) -> Result<DeviceIdentity>;

    async fn install(&self, path: &str) -> Result<String>;

    async fn uninstall(&self, package: &str) -> Result<String>;
}

/// Per-session settings, fixed when the session is created.
#[derive(Debug, Clone)]
pub struct AndroidSettings {
    /// Return a blank image when the screen cannot be captured.
    pub fallback_to_blank_screenshot: bool,
    /// Cap applied to every `run_shell` timeout.
    pub shell_timeout: Duration,
}

impl Default for AndroidSettings {
    fn default() -> Self {
        Self {
            fallback_to_blank_screenshot: true,
            shell_timeout: SHELL_TIMEOUT,
        }
    }
}

pub struct AndroidDevice {
    client: Arc<dyn AndroidClient>,
    settings: AndroidSettings,
}

impl AndroidDevice {
    pub fn new(client: Arc<dyn AndroidClient>, settings: AndroidSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl DeviceAdapter for AndroidDevice {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn screenshot(&self) -> Result<DynamicImage> {
        let captured = match self.client.screenshot().await {
            Ok(raw) => capture::decode(&raw, "android"),
            Err(e @ LensError::Capture { .. }) => Err(e),
            Err(e) => return Err(e),
        };
        match captured {
            Ok(img) => Ok(img),
            Err(e) if self.settings.fallback_to_blank_screenshot => {
                warn!(error = %e, "screen not capturable, returning blank placeholder");
                let size = self.client.window_size().await?;
                Ok(capture::blank_screenshot(size))
            }
            Err(e) => Err(e),
        }
    }

    async fn dump_hierarchy(&self) -> Result<Value> {
        let xml = self.client.dump_hierarchy().await?;
        hierarchy::android_hierarchy_to_json(&xml)
    }

    async fn dump_hierarchy_ext(&self) -> Result<HierarchySnapshot> {
        let current = self.client.app_current().await?;
        let xml = self.client.dump_hierarchy().await?;
        let json_hierarchy = hierarchy::android_hierarchy_to_json(&xml)?;
        let window_size = self.client.window_size().await?;
        Ok(HierarchySnapshot {
            xml_hierarchy: Some(xml),
            json_hierarchy,
            activity: Some(current.activity),
            package_name: Some(current.package),
            window_size,
        })
    }

    async fn window_size(&self) -> Result<WindowSize> {
        self.client.window_size().await
    }

    fn locate(&self, locator: &Locator) -> Box<dyn UiElement> {
        Box::new(AndroidElement {
            client: Arc::clone(&self.client),
            query: resolve_android(locator),
            locator: locator.clone(),
        })
    }

    async fn tap(&self, at: Point) -> Result<()> {
        self.client.tap(at).await
    }

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()> {
        self.client.long_press(at, duration).await
    }

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()> {
        self.client.swipe(from, to, duration).await
    }

    async fn directional_swipe(&self, direction: SwipeDirection, scale: f64) -> Result<()> {
        let size = self.client.window_size().await?;
        let (from, to) = gesture::directional_swipe_path(direction, scale, size)?;
        self.client
            .swipe(from, to, gesture::DIRECTIONAL_SWIPE_DURATION)
            .await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.client.press_key(&gesture::android_keycode(key)).await
    }

    async fn run_shell(&self, command: &str, timeout: Duration) -> Result<ShellOutput> {
        let bound = timeout.min(self.settings.shell_timeout);
        debug!(command, timeout_secs = bound.as_secs_f64(), "running shell command");
        match tokio::time::timeout(bound, self.client.shell(command)).await {
            Ok(result) => result,
            Err(_) => Err(LensError::CommandTimeout {
                command: command.to_string(),
                secs: bound.as_secs(),
            }),
        }
    }

    async fn identity(&self) -> Result<DeviceIdentity> {
        self.client.device_identity().await
    }

    async fn app_current(&self) -> Result<ForegroundApp> {
        self.client.app_current().await
    }

    async fn app_start(&self, package: &str, activity: Option<&str>) -> Result<()> {
        self.client.app_start(package, activity).await
    }

    async fn install_app(&self, path: &str) -> Result<String> {
        self.client.install(path).await
    }

    async fn uninstall_app(&self, package: &str) -> Result<String> {
        self.client.uninstall(package).await
    }
}

/// Element handle that re-dumps the hierarchy on every call.
struct AndroidElement {
    client: Arc<dyn AndroidClient>,
    locator: Locator,
    query: ElementQuery,
}

impl AndroidElement {
    async fn find(&self) -> Result<Option<ElementInfo>> {
        let xml = self.client.dump_hierarchy().await?;
        hierarchy::find_android_element(&xml, &self.query)
    }
}

#[async_trait]
impl UiElement for AndroidElement {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.find().await?.is_some())
    }

    async fn info(&self) -> Result<ElementInfo> {
        self.find().await?.ok_or_else(|| not_found(&self.locator))
    }

    async fn set_text(&self, text: &str) -> Result<()> {
        let info = self.info().await?;
        self.client.tap(info.bounds.center()).await?;
        self.client.clear_text(info.text.chars().count()).await?;
        self.client.input_text(text).await
    }

    async fn click(&self) -> Result<()> {
        let info = self.info().await?;
        self.client.tap(info.bounds.center()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAndroidClient, png_bytes};
    use uilens_core::LocatorKind;

    const DUMP: &str = r#"<hierarchy rotation="0">
  <node index="0" text="Name" resource-id="app:id/name" class="android.widget.EditText" content-desc="" enabled="true" selected="false" clickable="true" bounds="[0,100][1080,200]" />
</hierarchy>"#;

    fn device(client: MockAndroidClient, fallback: bool) -> (Arc<MockAndroidClient>, AndroidDevice) {
        let client = Arc::new(client);
        let settings = AndroidSettings {
            fallback_to_blank_screenshot: fallback,
            ..Default::default()
        };
        (Arc::clone(&client), AndroidDevice::new(client, settings))
    }

    #[tokio::test]
    async fn test_blank_screenshot_fallback() {
        let (_, d) = device(
            MockAndroidClient::new()
                .with_screenshot(Vec::new())
                .with_window_size(720, 1280),
            true,
        );
        let img = d.screenshot().await.unwrap();
        assert_eq!((img.width(), img.height()), (720, 1280));
    }

    #[tokio::test]
    async fn test_no_fallback_propagates() {
        let (_, d) = device(MockAndroidClient::new().with_screenshot(Vec::new()), false);
        assert!(matches!(d.screenshot().await, Err(LensError::Sdk { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_is_not_masked() {
        let (_, d) = device(MockAndroidClient::new().failing_screenshot(), true);
        assert!(matches!(d.screenshot().await, Err(LensError::Sdk { .. })));
    }

    #[tokio::test]
    async fn test_failed_screencap_falls_back_to_blank() {
        let (_, d) = device(
            MockAndroidClient::new()
                .failing_capture()
                .with_window_size(720, 1280),
            true,
        );
        let img = d.screenshot().await.unwrap();
        assert_eq!((img.width(), img.height()), (720, 1280));

        let (_, d) = device(MockAndroidClient::new().failing_capture(), false);
        assert!(matches!(d.screenshot().await, Err(LensError::Capture { .. })));
    }

    #[tokio::test]
    async fn test_real_capture_passes_through() {
        let (_, d) = device(
            MockAndroidClient::new().with_screenshot(png_bytes(4, 2)),
            true,
        );
        let img = d.screenshot().await.unwrap();
        assert_eq!(img.width(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_times_out_at_sixty_seconds() {
        let (_, d) = device(
            MockAndroidClient::new().with_shell_delay(Duration::from_secs(3600)),
            true,
        );
        let err = d
            .run_shell("sleep 3600", Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::CommandTimeout { secs: 60, .. }));
    }

    #[tokio::test]
    async fn test_shell_output() {
        let (_, d) = device(MockAndroidClient::new().with_shell_output("ok\n", 0), true);
        let out = d.run_shell("echo ok", SHELL_TIMEOUT).await.unwrap();
        assert_eq!(out.output, "ok\n");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_element_set_text_taps_clears_and_types() {
        let (client, d) = device(MockAndroidClient::new().with_hierarchy(DUMP), true);
        let el = d.locate(&Locator::new(LocatorKind::ResourceId, "app:id/name", 0));
        el.set_text("Alice").await.unwrap();
        assert_eq!(
            client.calls(),
            vec!["tap 540 150", "clear 4", "input Alice"]
        );
    }

    #[tokio::test]
    async fn test_missing_element() {
        let (client, d) = device(MockAndroidClient::new().with_hierarchy(DUMP), true);
        let el = d.locate(&Locator::new(LocatorKind::Text, "Nope", 0));
        assert!(!el.exists().await.unwrap());
        assert!(matches!(el.click().await, Err(LensError::ElementNotFound(_))));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_directional_swipe_uses_window_size() {
        let (client, d) = device(MockAndroidClient::new().with_window_size(1000, 2000), true);
        d.directional_swipe(SwipeDirection::Up, 0.8).await.unwrap();
        assert_eq!(client.calls(), vec!["swipe 500 1800 500 200 100"]);
    }

    #[tokio::test]
    async fn test_hierarchy_ext_includes_foreground_app() {
        let (_, d) = device(MockAndroidClient::new().with_hierarchy(DUMP), true);
        let snap = d.dump_hierarchy_ext().await.unwrap();
        assert_eq!(snap.package_name.as_deref(), Some("com.example.app"));
        assert_eq!(snap.json_hierarchy["_type"], "hierarchy");
        let wire = serde_json::to_value(&snap).unwrap();
        assert!(wire.get("xmlHierarchy").is_some());
        assert!(wire.get("windowSize").is_some());
    }
}
