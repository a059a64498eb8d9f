//! Unified error types for the cache facade and its drivers.

use std::fmt::Debug;
use thiserror::Error;

/// Reason a numeric adjustment could not be applied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOpFailure {
    /// The key does not exist or has expired.
    #[error("key not found")]
    NotFound,

    /// The stored value is not a number.
    #[error("value is not numeric")]
    NotNumeric,

    /// Applying the step would leave the value's range.
    #[error("operation would overflow")]
    Overflow,
}

/// Errors raised while scanning a cached value into a typed destination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Nothing is stored under the key.
    #[error("key '{key}' not found")]
    Missing { key: String },

    /// The stored value cannot be represented as the requested type.
    #[error("cannot scan {found} value into {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl ScanError {
    /// Creates a missing-key error.
    #[must_use]
    pub fn missing<T: Into<String>>(key: T) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub const fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

/// Unified error type for every cache operation that reports errors.
///
/// Operations with a boolean contract (`put`, `forget`, `has`, `flush`,
/// `forever`) never produce this type; they report failure as `false`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Scanning into a typed destination failed.
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// An increment or decrement could not be applied.
    #[error("Numeric operation failed for key '{key}': {reason}")]
    NumericOp {
        key: String,
        reason: NumericOpFailure,
    },

    /// The backend could not be reached or answered with a protocol error.
    #[error("Backend unavailable: {0}")]
    Backend(String),

    /// The store could not be configured.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Scan(ScanError::Missing { .. }) => "SCAN_MISSING",
            Self::Scan(ScanError::TypeMismatch { .. }) => "SCAN_TYPE_MISMATCH",
            Self::NumericOp { .. } => "NUMERIC_OP_ERROR",
            Self::Backend(_) => "BACKEND_UNAVAILABLE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Creates a numeric operation error.
    #[must_use]
    pub fn numeric<T: Into<String>>(key: T, reason: NumericOpFailure) -> Self {
        Self::NumericOp {
            key: key.into(),
            reason,
        }
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend<T: Into<String>>(message: T) -> Self {
        Self::Backend(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true when the key was absent (scan or numeric operation).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Scan(ScanError::Missing { .. })
                | Self::NumericOp {
                    reason: NumericOpFailure::NotFound,
                    ..
                }
        )
    }

    /// Checks if this error is retriable.
    ///
    /// Only backend failures are; the core itself never retries.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
