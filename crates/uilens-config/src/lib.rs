//! # uilens-config
//!
//! Configuration for uilens. Reads `uilens.toml`, then applies environment
//! variable overrides, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::UilensConfig;
pub use schema::{ConfigWarning, DeviceConfig, ServerConfig, WarningSeverity};
