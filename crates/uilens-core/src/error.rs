use thiserror::Error;

/// Unified error type for the uilens workspace.
#[derive(Error, Debug)]
pub enum LensError {
    // ── Session errors ─────────────────────────────────────────
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("device connection failed: {target}: {reason}")]
    Connection { target: String, reason: String },

    // ── Command errors ─────────────────────────────────────────
    #[error("invalid argument: {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("unsupported locator kind: {0}")]
    UnsupportedLocator(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("command timed out after {secs}s: {command}")]
    CommandTimeout { command: String, secs: u64 },

    #[error("{capability} is not supported on {platform}")]
    Unsupported {
        platform: String,
        capability: String,
    },

    // ── SDK errors ─────────────────────────────────────────────
    #[error("{platform} sdk error: {reason}")]
    Sdk { platform: String, reason: String },

    /// The device answered but could not produce a screen image.
    #[error("{platform} screen capture failed: {reason}")]
    Capture { platform: String, reason: String },

    #[error("hierarchy error: {0}")]
    Hierarchy(String),

    // ── Storage errors ─────────────────────────────────────────
    #[error("widget error: {0}")]
    Widget(String),

    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LensError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn sdk(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Sdk {
            platform: platform.into(),
            reason: reason.into(),
        }
    }

    pub fn capture(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Capture {
            platform: platform.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(platform: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Unsupported {
            platform: platform.into(),
            capability: capability.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
