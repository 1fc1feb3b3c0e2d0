//! # uilens-device
//!
//! Device sessions for uilens.
//!
//! - **Registry**: maps session ids (`android`, `android:10.0.0.7:5555`,
//!   `ios:http://10.0.0.9:8100`) to live adapters, connecting on demand
//! - **Android**: adapter over `adb` (screencap, uiautomator, `input`)
//! - **iOS**: adapter over the WebDriverAgent HTTP API, with
//!   `idevicescreenshot` as the secondary capture path
//!
//! Every adapter implements [`DeviceAdapter`]; the REST and WebSocket layers
//! in `uilens-server` only ever talk to that trait.

pub mod adapter;
pub mod adb;
pub mod android;
pub mod capture;
pub mod commands;
pub mod connector;
pub mod gesture;
pub mod hierarchy;
pub mod idevice;
pub mod ios;
pub mod locator;
pub mod mock;
pub mod registry;
pub mod wda;

pub use adapter::{DeviceAdapter, HierarchySnapshot, SHELL_TIMEOUT, UiElement};
pub use commands::{DeviceCommand, ELEMENT_MISSING_MSG};
pub use connector::{DeviceSettings, SdkConnector};
pub use registry::{Connector, DeviceRegistry, SessionSummary};
