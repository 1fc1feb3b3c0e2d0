use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, maps to `uilens.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UilensConfig {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub widgets: WidgetConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP/WebSocket listen address.
    pub listen: String,
    /// Send permissive CORS headers (the inspector UI is usually served
    /// from another origin).
    pub cors: bool,
    /// Optional bearer token required on `/api/v1/*`.
    pub api_key: Option<String>,
    /// Directory of a built inspector UI to serve at `/`.
    pub web_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:17310".into(),
            cors: true,
            api_key: None,
            web_dir: None,
        }
    }
}

// ── Device ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Path to the `adb` executable.
    pub adb_path: String,
    /// WebDriverAgent URL used for iOS sessions with an empty address
    /// (normally an `iproxy 8100 8100` forward).
    pub wda_usb_url: String,
    /// Path to `idevicescreenshot`, the secondary iOS capture tool.
    pub idevicescreenshot_path: String,
    /// Return a blank image when an Android screen cannot be captured.
    pub fallback_to_blank_screenshot: bool,
    /// Upper bound for `run_shell`, in seconds.
    pub shell_timeout_secs: u64,
    /// Upper bound for every other tool invocation, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".into(),
            wda_usb_url: "http://127.0.0.1:8100".into(),
            idevicescreenshot_path: "idevicescreenshot".into(),
            fallback_to_blank_screenshot: true,
            shell_timeout_secs: 60,
            command_timeout_secs: 30,
        }
    }
}

// ── Widgets ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Widget catalog directory (None = `~/.uilens/widgets`).
    pub store_dir: Option<PathBuf>,
    /// Base URL written into widget metadata for the saved images.
    pub public_url: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            public_url: "http://localhost:17310".into(),
        }
    }
}

impl WidgetConfig {
    pub fn resolved_store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".uilens")
                .join("widgets")
        })
    }
}

// ── Screen stream ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Interval between screen frames pushed over the device WebSocket.
    pub frame_interval_ms: u64,
    /// JPEG quality of streamed frames (1-100).
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 500,
            jpeg_quality: 70,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{label}: {}: {}", self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({h})")?;
        }
        Ok(())
    }
}

impl UilensConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: format!("'{}' is not a socket address", self.server.listen),
                severity: WarningSeverity::Error,
                hint: Some("Use host:port, e.g. 127.0.0.1:17310".into()),
            });
        } else if !self.server.listen.starts_with("127.") && self.server.api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listening on a non-loopback address without an api_key".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Anyone on the network can drive connected devices".into()),
            });
        }

        if self.device.shell_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "device.shell_timeout_secs".into(),
                message: "shell timeout is 0, every shell command would time out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }

        if self.device.command_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "device.command_timeout_secs".into(),
                message: "command timeout is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 30".into()),
            });
        }

        if !self.device.wda_usb_url.starts_with("http://")
            && !self.device.wda_usb_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                field: "device.wda_usb_url".into(),
                message: format!("'{}' is not an http(s) URL", self.device.wda_usb_url),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        if self.stream.frame_interval_ms < 50 {
            warnings.push(ConfigWarning {
                field: "stream.frame_interval_ms".into(),
                message: format!(
                    "{}ms between frames will saturate the device",
                    self.stream.frame_interval_ms
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Screen capture usually takes 200-800ms".into()),
            });
        }

        if !(1..=100).contains(&self.stream.jpeg_quality) {
            warnings.push(ConfigWarning {
                field: "stream.jpeg_quality".into(),
                message: format!("{} is outside 1-100", self.stream.jpeg_quality),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some("Falls back to pretty output".into()),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| w.to_string())
            .collect();
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors.join("\n"))
        }
    }
}
