//! Mock SDK clients for deterministic testing.
//!
//! Nothing here touches a real device. Mutating calls are recorded as short
//! strings (`"tap 540 960"`) so tests can assert on what reached the device.
//!
//! # Example
//! ```
//! use uilens_device::mock::MockAndroidClient;
//! let client = MockAndroidClient::new().with_window_size(1080, 2400);
//! assert!(client.calls().is_empty());
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use uilens_core::{
    DeviceIdentity, ElementInfo, ForegroundApp, LensError, Platform, Point, Result, ShellOutput,
    WindowSize,
};

use crate::adapter::DeviceAdapter;
use crate::android::{AndroidClient, AndroidDevice, AndroidSettings};
use crate::capture;
use crate::ios::{IosClient, IosDevice, PointF, SecondaryCapture};
use crate::registry::Connector;

/// A small valid PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    capture::encode_png(&capture::blank_screenshot(WindowSize { width, height }))
        .unwrap_or_default()
}

const EMPTY_HIERARCHY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><hierarchy rotation="0"></hierarchy>"#;

// ── Android ────────────────────────────────────────────────────

pub struct MockAndroidClient {
    hierarchy: Mutex<String>,
    /// `None` = capture transport failure.
    screenshot: Option<Vec<u8>>,
    /// screencap itself fails, as on secure screens.
    capture_failed: bool,
    window: WindowSize,
    foreground: ForegroundApp,
    /// `None` = identity lookup fails.
    identity: Option<DeviceIdentity>,
    shell_output: ShellOutput,
    shell_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockAndroidClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAndroidClient {
    pub fn new() -> Self {
        Self {
            hierarchy: Mutex::new(EMPTY_HIERARCHY.to_string()),
            screenshot: Some(png_bytes(27, 48)),
            capture_failed: false,
            window: WindowSize {
                width: 1080,
                height: 1920,
            },
            foreground: ForegroundApp {
                package: "com.example.app".into(),
                activity: "com.example.app.MainActivity".into(),
            },
            identity: Some(DeviceIdentity {
                serial: "mock-serial".into(),
                udid: "mock-serial-02:00:00:00:00:00-Mock".into(),
                model: "Mock".into(),
                hardware_address: "02:00:00:00:00:00".into(),
                port: None,
                sdk_version: Some("34".into()),
            }),
            shell_output: ShellOutput {
                output: String::new(),
                exit_code: 0,
            },
            shell_delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hierarchy(self, xml: &str) -> Self {
        *self.hierarchy.lock() = xml.to_string();
        self
    }

    /// Swap the UI dump of a live client.
    pub fn set_hierarchy(&self, xml: &str) {
        *self.hierarchy.lock() = xml.to_string();
    }

    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.screenshot = Some(bytes);
        self
    }

    pub fn failing_screenshot(mut self) -> Self {
        self.screenshot = None;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.capture_failed = true;
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window = WindowSize { width, height };
        self
    }

    pub fn with_foreground(mut self, package: &str, activity: &str) -> Self {
        self.foreground = ForegroundApp {
            package: package.into(),
            activity: activity.into(),
        };
        self
    }

    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn failing_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    pub fn with_shell_output(mut self, output: &str, exit_code: i32) -> Self {
        self.shell_output = ShellOutput {
            output: output.into(),
            exit_code,
        };
        self
    }

    /// Make every shell command take `delay` before answering.
    pub fn with_shell_delay(mut self, delay: Duration) -> Self {
        self.shell_delay = Some(delay);
        self
    }

    /// Recorded mutating calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AndroidClient for MockAndroidClient {
    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.capture_failed {
            return Err(LensError::capture("android", "Capturing failed"));
        }
        self.screenshot
            .clone()
            .ok_or_else(|| LensError::sdk("android", "mock capture transport failure"))
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        Ok(self.hierarchy.lock().clone())
    }

    async fn window_size(&self) -> Result<WindowSize> {
        Ok(self.window)
    }

    async fn app_current(&self) -> Result<ForegroundApp> {
        Ok(self.foreground.clone())
    }

    async fn app_start(&self, package: &str, activity: Option<&str>) -> Result<()> {
        match activity {
            Some(a) => self.record(format!("app_start {package}/{a}")),
            None => self.record(format!("app_start {package}")),
        }
        Ok(())
    }

    async fn tap(&self, at: Point) -> Result<()> {
        self.record(format!("tap {} {}", at.x, at.y));
        Ok(())
    }

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()> {
        self.record(format!("long_press {} {} {}", at.x, at.y, duration.as_millis()));
        Ok(())
    }

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()> {
        self.record(format!(
            "swipe {} {} {} {} {}",
            from.x,
            from.y,
            to.x,
            to.y,
            duration.as_millis()
        ));
        Ok(())
    }

    async fn press_key(&self, keycode: &str) -> Result<()> {
        self.record(format!("key {keycode}"));
        Ok(())
    }

    async fn input_text(&self, text: &str) -> Result<()> {
        self.record(format!("input {text}"));
        Ok(())
    }

    async fn clear_text(&self, count: usize) -> Result<()> {
        self.record(format!("clear {count}"));
        Ok(())
    }

    async fn shell(&self, command: &str) -> Result<ShellOutput> {
        self.record(format!("shell {command}"));
        if let Some(delay) = self.shell_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.shell_output.clone())
    }

    async fn device_identity(&self) -> Result<DeviceIdentity> {
        self.identity
            .clone()
            .ok_or_else(|| LensError::sdk("android", "mock device offline"))
    }

    async fn install(&self, path: &str) -> Result<String> {
        self.record(format!("install {path}"));
        Ok("Performing Streamed Install\nSuccess".into())
    }

    async fn uninstall(&self, package: &str) -> Result<String> {
        self.record(format!("uninstall {package}"));
        Ok("Success".into())
    }
}

// ── iOS ────────────────────────────────────────────────────────

pub struct MockIosClient {
    scale: f64,
    screenshot: Option<Vec<u8>>,
    source: Value,
    /// Window size in points.
    window: WindowSize,
    elements: Vec<(String, String, ElementInfo)>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockIosClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIosClient {
    pub fn new() -> Self {
        Self {
            scale: 3.0,
            screenshot: Some(png_bytes(39, 84)),
            source: json!({
                "type": "XCUIElementTypeApplication",
                "label": "Mock",
                "rect": {"x": 0, "y": 0, "width": 390, "height": 844},
                "children": []
            }),
            window: WindowSize {
                width: 390,
                height: 844,
            },
            elements: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn failing_screenshot(mut self) -> Self {
        self.screenshot = None;
        self
    }

    pub fn with_source(mut self, source: Value) -> Self {
        self.source = source;
        self
    }

    /// Register an element returned by `find_elements(using, value)`.
    pub fn with_element(mut self, using: &str, value: &str, info: ElementInfo) -> Self {
        self.elements.push((using.into(), value.into(), info));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn element(&self, id: &str) -> Result<&ElementInfo> {
        id.strip_prefix("el-")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.elements.get(i))
            .map(|(_, _, info)| info)
            .ok_or_else(|| LensError::sdk("ios", format!("no such element {id}")))
    }
}

#[async_trait]
impl IosClient for MockIosClient {
    async fn scale(&self) -> Result<f64> {
        Ok(self.scale)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.screenshot
            .clone()
            .ok_or_else(|| LensError::sdk("ios", "mock WebDriverAgent capture failure"))
    }

    async fn source(&self) -> Result<Value> {
        Ok(self.source.clone())
    }

    async fn window_size(&self) -> Result<WindowSize> {
        Ok(self.window)
    }

    async fn active_app(&self) -> Result<ForegroundApp> {
        Ok(ForegroundApp {
            package: "com.apple.Preferences".into(),
            activity: "Settings".into(),
        })
    }

    async fn launch_app(&self, bundle_id: &str) -> Result<()> {
        self.record(format!("launch {bundle_id}"));
        Ok(())
    }

    async fn tap(&self, at: PointF) -> Result<()> {
        self.record(format!("tap {} {}", at.x, at.y));
        Ok(())
    }

    async fn touch_and_hold(&self, at: PointF, duration: Duration) -> Result<()> {
        self.record(format!("hold {} {} {}", at.x, at.y, duration.as_millis()));
        Ok(())
    }

    async fn drag(&self, from: PointF, to: PointF, duration: Duration) -> Result<()> {
        self.record(format!(
            "drag {} {} {} {} {}",
            from.x,
            from.y,
            to.x,
            to.y,
            duration.as_millis()
        ));
        Ok(())
    }

    async fn press_button(&self, name: &str) -> Result<()> {
        self.record(format!("button {name}"));
        Ok(())
    }

    async fn find_elements(&self, using: &str, value: &str) -> Result<Vec<String>> {
        Ok(self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, (u, v, _))| u == using && v == value)
            .map(|(i, _)| format!("el-{i}"))
            .collect())
    }

    async fn element_info(&self, id: &str) -> Result<ElementInfo> {
        self.element(id).cloned()
    }

    async fn element_click(&self, id: &str) -> Result<()> {
        self.element(id)?;
        self.record(format!("click {id}"));
        Ok(())
    }

    async fn element_clear(&self, id: &str) -> Result<()> {
        self.element(id)?;
        self.record(format!("clear {id}"));
        Ok(())
    }

    async fn element_set_value(&self, id: &str, text: &str) -> Result<()> {
        self.element(id)?;
        self.record(format!("set_value {id} {text}"));
        Ok(())
    }

    async fn device_identity(&self) -> Result<DeviceIdentity> {
        Ok(DeviceIdentity {
            serial: "00008110-MOCK".into(),
            udid: "00008110-MOCK".into(),
            model: "iPhone".into(),
            hardware_address: String::new(),
            port: Some(8100),
            sdk_version: Some("17.4".into()),
        })
    }
}

/// Secondary capture returning fixed bytes (or failing) and counting calls.
pub struct MockCapture {
    bytes: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl MockCapture {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            bytes: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryCapture for MockCapture {
    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bytes
            .clone()
            .ok_or_else(|| LensError::sdk("ios", "mock secondary capture failure"))
    }
}

// ── Connector ──────────────────────────────────────────────────

/// Connector producing mock-backed adapters and counting connections.
#[derive(Default)]
pub struct MockConnector {
    connects: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
    android: Option<Arc<MockAndroidClient>>,
    broken_identity: HashSet<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection attempt fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Wait before completing each connection (to widen race windows).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Back every Android session with this client.
    pub fn with_android(mut self, client: Arc<MockAndroidClient>) -> Self {
        self.android = Some(client);
        self
    }

    /// Android sessions at `address` report identity lookup failures.
    pub fn with_broken_identity(mut self, address: &str) -> Self {
        self.broken_identity.insert(address.to_string());
        self
    }

    /// Number of underlying connections opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, platform: Platform, address: &str) -> Result<Arc<dyn DeviceAdapter>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(LensError::connection(
                format!("{platform}:{address}"),
                "mock connection refused",
            ));
        }
        match platform {
            Platform::Android => {
                let client = match &self.android {
                    Some(shared) => Arc::clone(shared),
                    None => {
                        let serial = if address.is_empty() { "mock-serial" } else { address };
                        let mut client = MockAndroidClient::new().with_identity(DeviceIdentity {
                            serial: serial.into(),
                            udid: format!("{serial}-02:00:00:00:00:00-Mock"),
                            model: "Mock".into(),
                            hardware_address: "02:00:00:00:00:00".into(),
                            port: address.rsplit(':').next().and_then(|p| p.parse().ok()),
                            sdk_version: Some("34".into()),
                        });
                        if self.broken_identity.contains(address) {
                            client = client.failing_identity();
                        }
                        Arc::new(client)
                    }
                };
                Ok(Arc::new(AndroidDevice::new(client, AndroidSettings::default())))
            }
            Platform::Ios => {
                let device = IosDevice::connect(
                    Arc::new(MockIosClient::new()),
                    Arc::new(MockCapture::failing()),
                )
                .await?;
                Ok(Arc::new(device))
            }
        }
    }
}
