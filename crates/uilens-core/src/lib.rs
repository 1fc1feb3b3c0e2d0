//! # uilens-core
//!
//! Core types and primitives shared by every uilens crate: the error type,
//! platform and session identifiers, element locators, and coercion of the
//! loosely-typed arguments the inspector UI sends.

pub mod error;
pub mod input;
pub mod locator;
pub mod types;

pub use error::{LensError, Result};
pub use input::LooseValue;
pub use locator::{Locator, LocatorKind};
pub use types::*;
