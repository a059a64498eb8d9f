//! Configuration validation.
//!
//! Collects every problem in a [`StoreConfig`] so the factory can fail fast
//! on invalid configuration instead of on the first backend call.

use crate::{BackendKind, StoreConfig};
use coffer_core::CacheError;
use std::fmt;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Redis address is not `host:port`.
    InvalidRedisAddress { address: String },
    /// A pool must hold at least one connection.
    ZeroPoolSize { name: String },
    /// SQL URL is empty.
    EmptySqlUrl,
    /// SQL table name is not a plain identifier.
    InvalidTableName { table: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRedisAddress { address } => {
                write!(f, "Invalid Redis address '{}' (expected host:port)", address)
            }
            Self::ZeroPoolSize { name } => {
                write!(f, "Pool size for {} must be at least 1", name)
            }
            Self::EmptySqlUrl => write!(f, "SQL URL must not be empty"),
            Self::InvalidTableName { table } => {
                write!(
                    f,
                    "Invalid SQL table name '{}' (letters, digits and '_' only)",
                    table
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to a cache result, joining all messages into one
    /// configuration error.
    pub fn into_result(self) -> Result<(), CacheError> {
        if self.is_valid() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(CacheError::Configuration(message))
    }
}

/// Validates the settings relevant to the configured backend.
pub fn validate(config: &StoreConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    match config.backend {
        BackendKind::Memory => {}
        BackendKind::Redis => {
            let address = config.redis.address();
            if !is_host_port(address) {
                result.add_error(ConfigValidationError::InvalidRedisAddress {
                    address: address.to_string(),
                });
            }
            if config.redis.pool_size == 0 {
                result.add_error(ConfigValidationError::ZeroPoolSize {
                    name: "redis".to_string(),
                });
            }
        }
        BackendKind::Sql => {
            if config.sql.url().trim().is_empty() {
                result.add_error(ConfigValidationError::EmptySqlUrl);
            }
            if !is_identifier(config.sql.table()) {
                result.add_error(ConfigValidationError::InvalidTableName {
                    table: config.sql.table().to_string(),
                });
            }
            if config.sql.max_connections == 0 {
                result.add_error(ConfigValidationError::ZeroPoolSize {
                    name: "sql".to_string(),
                });
            }
        }
    }

    result
}

fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0),
        None => false,
    }
}

/// Returns true for a plain SQL identifier: a letter or underscore, then
/// letters, digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
