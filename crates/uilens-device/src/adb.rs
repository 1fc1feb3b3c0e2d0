//! [`AndroidClient`] over the `adb` command-line tool.
//!
//! # Requirements
//!
//! `adb` must be installed (path configurable via `[device] adb_path`).
//! On macOS: `brew install android-platform-tools`.

use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use tracing::{debug, info};

use uilens_core::{DeviceIdentity, ForegroundApp, LensError, Point, Result, ShellOutput, WindowSize};

use crate::android::AndroidClient;

const DUMP_PATH: &str = "/sdcard/uilens_ui.xml";
const DEFAULT_ADB_PORT: u16 = 5555;

/// Spawn `adb [-s serial] args...` and collect its output.
async fn run_adb(
    adb_path: &str,
    serial: Option<&str>,
    args: &[&str],
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = tokio::process::Command::new(adb_path);
    if let Some(serial) = serial {
        cmd.arg("-s").arg(serial);
    }
    cmd.args(args).kill_on_drop(true);

    let run = cmd.output();
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| LensError::CommandTimeout {
                command: format!("adb {}", args.join(" ")),
                secs: limit.as_secs(),
            })?,
        None => run.await,
    };
    output.map_err(|e| {
        LensError::sdk(
            "android",
            format!("adb not found or failed to start ({adb_path}): {e}"),
        )
    })
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// `adb -s serial get-state`, or `None` when adb does not know the device.
async fn device_state(adb_path: &str, serial: &str, timeout: Duration) -> Result<Option<String>> {
    let out = run_adb(adb_path, Some(serial), &["get-state"], Some(timeout)).await?;
    let state = stdout_text(&out).trim().to_string();
    Ok((out.status.success() && !state.is_empty()).then_some(state))
}

/// `adb connect host:port`, returning the resulting serial and port.
async fn adb_connect(
    adb_path: &str,
    target: &str,
    timeout: Duration,
) -> Result<(String, Option<u16>)> {
    let out = run_adb(adb_path, None, &["connect", target], Some(timeout)).await?;
    let text = stdout_text(&out);
    if !text.contains("connected to") {
        return Err(LensError::connection(target, text.trim()));
    }
    let port = target.rsplit(':').next().and_then(|p| p.parse().ok());
    Ok((target.to_string(), port))
}

/// Classify a failed `exec-out screencap`: adb's own `error:`/`adb:` lines
/// mean the device is unreachable, anything else is the capture failing.
fn screencap_error(stdout: &[u8], stderr: &[u8]) -> LensError {
    let stderr = String::from_utf8_lossy(stderr);
    let message = if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    if message.starts_with("error:") || message.starts_with("adb:") {
        LensError::sdk("android", format!("adb exec-out screencap -p failed: {message}"))
    } else {
        LensError::capture("android", message)
    }
}

pub struct AdbClient {
    adb_path: String,
    serial: String,
    port: Option<u16>,
    timeout: Duration,
}

impl AdbClient {
    /// Attach to a device. An empty `address` selects the only USB device.
    /// Otherwise it is a serial adb already knows (`emulator-5554`), or a
    /// network host that gets `adb connect`ed (port 5555 when omitted).
    pub async fn connect(adb_path: &str, address: &str, timeout: Duration) -> Result<Self> {
        let (serial, port) = if address.is_empty() {
            let out = run_adb(adb_path, None, &["get-serialno"], Some(timeout)).await?;
            let serial = stdout_text(&out).trim().to_string();
            if !out.status.success() || serial.is_empty() || serial == "unknown" {
                return Err(LensError::connection(
                    "android",
                    "no device attached (or more than one; pass an address)",
                ));
            }
            (serial, None)
        } else if address.contains(':') {
            adb_connect(adb_path, address, timeout).await?
        } else if device_state(adb_path, address, timeout).await?.is_some() {
            (address.to_string(), None)
        } else {
            let target = format!("{address}:{DEFAULT_ADB_PORT}");
            adb_connect(adb_path, &target, timeout).await?
        };

        match device_state(adb_path, &serial, timeout).await? {
            Some(state) if state == "device" => {}
            state => {
                return Err(LensError::connection(
                    &serial,
                    format!("device not ready: {}", state.as_deref().unwrap_or("not found")),
                ));
            }
        }

        info!(%serial, "adb device attached");
        Ok(Self {
            adb_path: adb_path.to_string(),
            serial,
            port,
            timeout,
        })
    }

    /// Run an adb command against this device and return stdout.
    async fn adb(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = run_adb(&self.adb_path, Some(self.serial.as_str()), args, Some(self.timeout)).await?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(LensError::sdk(
                "android",
                format!("adb {} failed: {}", args.join(" "), stderr.trim()),
            ))
        }
    }

    async fn shell_text(&self, cmd: &str) -> Result<String> {
        let out = self.adb(&["shell", cmd]).await?;
        Ok(String::from_utf8_lossy(&out).to_string())
    }
}

#[async_trait]
impl AndroidClient for AdbClient {
    async fn screenshot(&self) -> Result<Vec<u8>> {
        let args = ["exec-out", "screencap", "-p"];
        let out = run_adb(&self.adb_path, Some(self.serial.as_str()), &args, Some(self.timeout)).await?;
        if out.status.success() {
            Ok(out.stdout)
        } else {
            Err(screencap_error(&out.stdout, &out.stderr))
        }
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        let cmd = format!("uiautomator dump {DUMP_PATH} >/dev/null && cat {DUMP_PATH}");
        let raw = self.shell_text(&cmd).await?;
        let start = raw
            .find('<')
            .ok_or_else(|| LensError::Hierarchy(format!("uiautomator dump failed: {}", raw.trim())))?;
        Ok(raw[start..].trim_end().to_string())
    }

    async fn window_size(&self) -> Result<WindowSize> {
        let out = self.shell_text("wm size").await?;
        parse_wm_size(&out)
            .ok_or_else(|| LensError::sdk("android", format!("unexpected wm size output: {}", out.trim())))
    }

    async fn app_current(&self) -> Result<ForegroundApp> {
        let out = self
            .shell_text("dumpsys activity activities | grep -E 'mResumedActivity|topResumedActivity'")
            .await?;
        parse_resumed_activity(&out)
            .ok_or_else(|| LensError::sdk("android", "no resumed activity found"))
    }

    async fn app_start(&self, package: &str, activity: Option<&str>) -> Result<()> {
        let cmd = match activity {
            Some(activity) => format!("am start -n {package}/{activity}"),
            None => format!("monkey -p {package} -c android.intent.category.LAUNCHER 1"),
        };
        self.shell_text(&cmd).await?;
        info!(package, "app started");
        Ok(())
    }

    async fn tap(&self, at: Point) -> Result<()> {
        self.shell_text(&format!("input tap {} {}", at.x, at.y)).await?;
        Ok(())
    }

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()> {
        let ms = duration.as_millis();
        self.shell_text(&format!("input swipe {0} {1} {0} {1} {ms}", at.x, at.y))
            .await?;
        Ok(())
    }

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()> {
        let ms = duration.as_millis();
        self.shell_text(&format!(
            "input swipe {} {} {} {} {ms}",
            from.x, from.y, to.x, to.y
        ))
        .await?;
        Ok(())
    }

    async fn press_key(&self, keycode: &str) -> Result<()> {
        self.shell_text(&format!("input keyevent {keycode}")).await?;
        Ok(())
    }

    async fn input_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.shell_text(&format!("input text {}", input_text_arg(text)))
            .await?;
        Ok(())
    }

    async fn clear_text(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let deletes = vec!["67"; count].join(" ");
        self.shell_text(&format!("input keyevent KEYCODE_MOVE_END && input keyevent {deletes}"))
            .await?;
        Ok(())
    }

    async fn shell(&self, command: &str) -> Result<ShellOutput> {
        let out = run_adb(&self.adb_path, Some(self.serial.as_str()), &["shell", command], None).await?;
        let mut output = stdout_text(&out);
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ShellOutput {
            output,
            exit_code: out.status.code().unwrap_or(-1),
        })
    }

    async fn device_identity(&self) -> Result<DeviceIdentity> {
        let out = self
            .shell_text(
                "getprop ro.product.model; getprop ro.build.version.sdk; \
                 cat /sys/class/net/wlan0/address 2>/dev/null",
            )
            .await?;
        Ok(parse_identity(&self.serial, self.port, &out))
    }

    async fn install(&self, path: &str) -> Result<String> {
        debug!(serial = %self.serial, path, "installing package");
        let out = self.adb(&["install", "-r", path]).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    async fn uninstall(&self, package: &str) -> Result<String> {
        debug!(serial = %self.serial, package, "uninstalling package");
        let out = self.adb(&["uninstall", package]).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }
}

// ── Output parsers ─────────────────────────────────────────────

/// Parse `wm size`, preferring the override size when one is set.
fn parse_wm_size(output: &str) -> Option<WindowSize> {
    let pick = |prefix: &str| {
        output
            .lines()
            .find(|l| l.trim_start().starts_with(prefix))
            .and_then(|l| l.split(':').nth(1))
    };
    let size = pick("Override size").or_else(|| pick("Physical size"))?;
    let (w, h) = size.trim().split_once('x')?;
    Some(WindowSize {
        width: w.trim().parse().ok()?,
        height: h.trim().parse().ok()?,
    })
}

/// Extract `package/activity` from a `mResumedActivity: ActivityRecord{...}` line.
fn parse_resumed_activity(output: &str) -> Option<ForegroundApp> {
    let component = output
        .split_whitespace()
        .find(|tok| tok.contains('/') && !tok.starts_with('{'))?
        .trim_end_matches('}');
    let (package, activity) = component.split_once('/')?;
    let activity = if activity.starts_with('.') {
        format!("{package}{activity}")
    } else {
        activity.to_string()
    };
    Some(ForegroundApp {
        package: package.to_string(),
        activity,
    })
}

fn parse_identity(serial: &str, port: Option<u16>, output: &str) -> DeviceIdentity {
    let mut lines = output.lines().map(str::trim);
    let model = lines.next().unwrap_or_default().to_string();
    let sdk = lines.next().filter(|s| !s.is_empty()).map(str::to_string);
    // wlan0 is absent on emulators and wired devices.
    let hwaddr = lines.next().unwrap_or_default().to_string();
    DeviceIdentity {
        udid: format!("{serial}-{hwaddr}-{}", model.replace(' ', "_")),
        serial: serial.to_string(),
        model,
        hardware_address: hwaddr,
        port,
        sdk_version: sdk,
    }
}

/// Encode text for `input text`: spaces become `%s`, then the whole
/// argument is single-quoted for the device shell.
fn input_text_arg(text: &str) -> String {
    let encoded = text.replace(' ', "%s").replace('\'', "'\\''");
    format!("'{encoded}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wm_size() {
        let out = "Physical size: 1080x2400\n";
        assert_eq!(
            parse_wm_size(out),
            Some(WindowSize {
                width: 1080,
                height: 2400
            })
        );
        let out = "Physical size: 1080x2400\nOverride size: 720x1600\n";
        assert_eq!(parse_wm_size(out).unwrap().width, 720);
        assert_eq!(parse_wm_size("error: no devices"), None);
    }

    #[test]
    fn test_parse_resumed_activity() {
        let out = "    mResumedActivity: ActivityRecord{9b5e5c1 u0 com.android.settings/.Settings t12}\n";
        let app = parse_resumed_activity(out).unwrap();
        assert_eq!(app.package, "com.android.settings");
        assert_eq!(app.activity, "com.android.settings.Settings");

        let out = "topResumedActivity=ActivityRecord{1 u0 com.example/com.example.ui.Main t3}";
        let app = parse_resumed_activity(out).unwrap();
        assert_eq!(app.activity, "com.example.ui.Main");
        assert!(parse_resumed_activity("").is_none());
    }

    #[test]
    fn test_parse_identity() {
        let id = parse_identity(
            "127.0.0.1:5555",
            Some(5555),
            "Pixel 7\n34\n02:00:00:44:55:66\n",
        );
        assert_eq!(id.serial, "127.0.0.1:5555");
        assert_eq!(id.model, "Pixel 7");
        assert_eq!(id.sdk_version.as_deref(), Some("34"));
        assert_eq!(id.hardware_address, "02:00:00:44:55:66");
        assert_eq!(id.udid, "127.0.0.1:5555-02:00:00:44:55:66-Pixel_7");
        assert_eq!(id.port, Some(5555));

        let id = parse_identity("emulator-5554", None, "sdk_gphone64\n33\n");
        assert_eq!(id.hardware_address, "");
    }

    #[test]
    fn test_screencap_error_classification() {
        assert!(matches!(
            screencap_error(b"", b"Capturing failed\n"),
            LensError::Capture { .. }
        ));
        assert!(matches!(
            screencap_error(b"Capturing failed", b""),
            LensError::Capture { .. }
        ));
        assert!(matches!(
            screencap_error(b"", b"error: device offline"),
            LensError::Sdk { .. }
        ));
    }

    /// Write an `adb` stand-in that logs its arguments and answers like a
    /// USB emulator plus one network device at 10.0.0.7.
    #[cfg(unix)]
    fn fake_adb(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("adb");
        let log = dir.join("calls.log");
        let script = format!(
            r#"#!/bin/sh
echo "$*" >> '{}'
case "$*" in
  "-s emulator-5554 get-state") echo device ;;
  "-s 10.0.0.7:5555 get-state") echo device ;;
  "connect 10.0.0.7:5555") echo "connected to 10.0.0.7:5555" ;;
  "-s emulator-5554 exec-out screencap -p") echo "Capturing failed" >&2; exit 1 ;;
  *) echo "error: device '$2' not found" >&2; exit 1 ;;
esac
"#,
            log.display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    fn logged_calls(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_usb_serial() {
        let dir = tempfile::tempdir().unwrap();
        let adb = fake_adb(dir.path());
        let client = AdbClient::connect(&adb, "emulator-5554", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(client.serial, "emulator-5554");
        assert_eq!(client.port, None);
        let calls = logged_calls(dir.path());
        assert!(calls.iter().all(|c| !c.starts_with("connect")), "{calls:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_network_host_adds_default_port() {
        let dir = tempfile::tempdir().unwrap();
        let adb = fake_adb(dir.path());
        let client = AdbClient::connect(&adb, "10.0.0.7", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(client.serial, "10.0.0.7:5555");
        assert_eq!(client.port, Some(5555));
        assert!(logged_calls(dir.path()).contains(&"connect 10.0.0.7:5555".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_unknown_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let adb = fake_adb(dir.path());
        let err = AdbClient::connect(&adb, "R58M123ABC", Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LensError::Connection { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_screencap_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let adb = fake_adb(dir.path());
        let client = AdbClient::connect(&adb, "emulator-5554", Duration::from_secs(5))
            .await
            .unwrap();
        let err = client.screenshot().await.unwrap_err();
        assert!(matches!(err, LensError::Capture { .. }), "{err}");
    }

    #[test]
    fn test_input_text_quoting() {
        assert_eq!(input_text_arg("hello world"), "'hello%sworld'");
        assert_eq!(input_text_arg("it's"), "'it'\\''s'");
    }
}
