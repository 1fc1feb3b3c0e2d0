use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use uilens_config::{ConfigLoader, UilensConfig, WarningSeverity};
use uilens_core::{LensError, Platform};
use uilens_device::{DeviceAdapter, DeviceRegistry, SdkConnector, capture};

/// uilens: REST/WebSocket inspector bridge for Android and iOS devices
#[derive(Parser)]
#[command(name = "uilens", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to uilens.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Listen address, overrides server.listen
        #[arg(long)]
        listen: Option<String>,
        /// Directory of a built inspector UI to serve at /
        #[arg(long)]
        web_dir: Option<PathBuf>,
    },
    /// Connect to a device and print its identity
    Connect {
        /// android or ios
        platform: String,
        /// adb serial/host:port or WebDriverAgent URL (empty = default device)
        #[arg(default_value = "")]
        address: String,
    },
    /// Save a screenshot (PNG, or JPEG for .jpg/.jpeg paths)
    Screenshot {
        /// Session id, e.g. android, android:10.0.0.7:5555, ios
        device: String,
        #[arg(short, long, default_value = "screenshot.png")]
        output: PathBuf,
    },
    /// Print the view hierarchy as JSON
    Dump {
        /// Session id, e.g. android, android:10.0.0.7:5555, ios
        device: String,
        /// Include the raw dump, foreground app and window size
        #[arg(long)]
        ext: bool,
    },
    /// Run a shell command on an Android device
    Shell {
        /// Session id, e.g. android, android:10.0.0.7:5555
        device: String,
        /// Timeout in seconds, capped by device.shell_timeout_secs
        #[arg(short, long, default_value = "60")]
        timeout: u64,
        /// Command line to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Show version and build info
    Version,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Audit configuration
    Doctor,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> uilens_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Serve { listen, web_dir } => Self::cmd_serve(config, listen, web_dir).await,
            Commands::Connect { platform, address } => {
                Self::cmd_connect(config, &platform, &address).await
            }
            Commands::Screenshot { device, output } => {
                Self::cmd_screenshot(config, &device, &output).await
            }
            Commands::Dump { device, ext } => Self::cmd_dump(config, &device, ext).await,
            Commands::Shell {
                device,
                timeout,
                command,
            } => Self::cmd_shell(config, &device, timeout, command.join(" ")).await,
            Commands::Version => Self::cmd_version(),
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Doctor => Self::cmd_doctor(config, config_loader.path()),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    async fn cmd_serve(
        mut config: UilensConfig,
        listen: Option<String>,
        web_dir: Option<PathBuf>,
    ) -> uilens_core::Result<()> {
        if let Some(listen) = listen {
            config.server.listen = listen;
        }
        if web_dir.is_some() {
            config.server.web_dir = web_dir;
        }
        println!("uilens v{}", env!("CARGO_PKG_VERSION"));
        println!("   Listen:  http://{}", config.server.listen);
        println!(
            "   Widgets: {}",
            config.widgets.resolved_store_dir().display()
        );
        if config.server.api_key.is_some() {
            println!("   Auth:    bearer token required on /api/v1/*");
        }
        println!();
        uilens_server::start_server(config).await
    }

    async fn cmd_connect(
        config: UilensConfig,
        platform: &str,
        address: &str,
    ) -> uilens_core::Result<()> {
        let registry = registry(&config);
        let id = registry.connect(platform, address).await?;
        let device = registry.get(id.as_str()).await?;
        let identity = device.identity().await?;
        info!(session = %id, serial = %identity.serial, "connected");
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "deviceId": id,
            "devicesInfo": identity,
        }))?);
        Ok(())
    }

    async fn cmd_screenshot(
        config: UilensConfig,
        device: &str,
        output: &Path,
    ) -> uilens_core::Result<()> {
        let device = open(&config, device).await?;
        let img = device.screenshot().await?;
        let bytes = if is_jpeg_path(output) {
            capture::encode_jpeg(&img, 90)?
        } else {
            capture::encode_png(&img)?
        };
        std::fs::write(output, bytes)?;
        println!(
            "Saved {}x{} screenshot to {}",
            img.width(),
            img.height(),
            output.display()
        );
        Ok(())
    }

    async fn cmd_dump(config: UilensConfig, device: &str, ext: bool) -> uilens_core::Result<()> {
        let device = open(&config, device).await?;
        let out = if ext {
            serde_json::to_string_pretty(&device.dump_hierarchy_ext().await?)?
        } else {
            serde_json::to_string_pretty(&device.dump_hierarchy().await?)?
        };
        println!("{out}");
        Ok(())
    }

    async fn cmd_shell(
        config: UilensConfig,
        device: &str,
        timeout: u64,
        command: String,
    ) -> uilens_core::Result<()> {
        let device = open(&config, device).await?;
        let out = device
            .run_shell(&command, Duration::from_secs(timeout))
            .await?;
        print!("{}", out.output);
        if out.exit_code != 0 {
            return Err(LensError::sdk(
                Platform::Android.as_str(),
                format!("'{command}' exited with code {}", out.exit_code),
            ));
        }
        Ok(())
    }

    fn cmd_version() -> uilens_core::Result<()> {
        println!("uilens v{}", env!("CARGO_PKG_VERSION"));
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_config(config: UilensConfig, json: bool) -> uilens_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| LensError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: UilensConfig, path: &Path) -> uilens_core::Result<()> {
        println!("uilens doctor: configuration audit");
        println!("   Config: {}", path.display());
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };
        for w in &warnings {
            println!("  {w}");
        }
        let warn_count = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Warning)
            .count();

        if which(&config.device.adb_path).is_none() {
            println!("  warning: device.adb_path: '{}' not found", config.device.adb_path);
        }
        if which(&config.device.idevicescreenshot_path).is_none() {
            println!(
                "  note: device.idevicescreenshot_path: '{}' not found, iOS capture has no secondary path",
                config.device.idevicescreenshot_path
            );
        }

        println!();
        println!("  {warn_count} warnings");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> uilens_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "uilens", &mut std::io::stdout());
        Ok(())
    }
}

fn init_tracing(format: &str, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn registry(config: &UilensConfig) -> DeviceRegistry {
    let connector = SdkConnector::new(uilens_server::device_settings(config));
    DeviceRegistry::new(Arc::new(connector))
}

async fn open(config: &UilensConfig, device: &str) -> uilens_core::Result<Arc<dyn DeviceAdapter>> {
    registry(config).get(device).await
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Resolve a tool name against `PATH`; paths with a separator are checked as-is.
fn which(tool: &str) -> Option<PathBuf> {
    let candidate = Path::new(tool);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["uilens", "serve", "--listen", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve { listen, web_dir } => {
                assert_eq!(listen.as_deref(), Some("0.0.0.0:9000"));
                assert!(web_dir.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_connect_default_address() {
        let cli = Cli::try_parse_from(["uilens", "connect", "ios"]).unwrap();
        match cli.command {
            Commands::Connect { platform, address } => {
                assert_eq!(platform, "ios");
                assert_eq!(address, "");
            }
            _ => panic!("expected connect"),
        }
    }

    #[test]
    fn test_parse_shell_collects_trailing_args() {
        let cli = Cli::try_parse_from([
            "uilens", "shell", "android", "-t", "5", "ls", "-la", "/sdcard",
        ])
        .unwrap();
        match cli.command {
            Commands::Shell {
                device,
                timeout,
                command,
            } => {
                assert_eq!(device, "android");
                assert_eq!(timeout, 5);
                assert_eq!(command.join(" "), "ls -la /sdcard");
            }
            _ => panic!("expected shell"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["uilens", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_jpeg_path_detection() {
        assert!(is_jpeg_path(Path::new("shot.JPG")));
        assert!(is_jpeg_path(Path::new("out/shot.jpeg")));
        assert!(!is_jpeg_path(Path::new("shot.png")));
        assert!(!is_jpeg_path(Path::new("shot")));
    }

    #[test]
    fn test_which_missing_tool() {
        assert!(which("definitely-not-a-real-tool-uilens").is_none());
        assert!(which("/nonexistent/dir/adb").is_none());
    }
}
