//! # uilens-cli
//!
//! Command-line interface for uilens.
//!
//! ## Commands
//!
//! - `uilens serve` - Start the HTTP/WebSocket server
//! - `uilens connect` - Connect to a device and print its identity
//! - `uilens screenshot` - Save a device screenshot
//! - `uilens dump` - Print the view hierarchy
//! - `uilens shell` - Run a shell command on an Android device
//! - `uilens config` / `uilens doctor` - Show and audit configuration

pub mod commands;

pub use commands::Cli;
