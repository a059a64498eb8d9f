//! # Coffer Config
//!
//! Configuration for Coffer stores: the backend selection, the prefix and
//! expiration defaults, and the connection settings of each backend.
//! Supports layered loading from files and environment variables.

mod loader;
mod store_config;
pub mod validation;

pub use loader::*;
pub use store_config::*;
pub use validation::{validate, ConfigValidationError, ValidationResult};
