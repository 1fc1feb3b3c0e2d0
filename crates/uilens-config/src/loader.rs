use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::UilensConfig;
use uilens_core::LensError;

/// Loads the uilens configuration from disk and the environment.
pub struct ConfigLoader {
    config: UilensConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > UILENS_CONFIG env > ~/.uilens/uilens.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("UILENS_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".uilens")
            .join("uilens.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> uilens_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            UilensConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(LensError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn read(path: &Path) -> uilens_core::Result<UilensConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<UilensConfig>(&raw).map_err(|e| {
            LensError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// A copy of the loaded config.
    pub fn get(&self) -> UilensConfig {
        self.config.clone()
    }

    /// Path the config was resolved to (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (UILENS_LISTEN, UILENS_LOG_LEVEL, ...).
    fn apply_env_overrides(mut config: UilensConfig) -> UilensConfig {
        if let Ok(v) = std::env::var("UILENS_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("UILENS_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("UILENS_ADB_PATH") {
            config.device.adb_path = v;
        }
        if let Ok(v) = std::env::var("UILENS_WIDGET_DIR") {
            config.widgets.store_dir = Some(PathBuf::from(v));
        }
        // API key: config file takes priority, env is the fallback.
        if config.server.api_key.is_none() {
            if let Ok(v) = std::env::var("UILENS_API_KEY") {
                config.server.api_key = Some(v);
            }
        }
        config
    }
}
