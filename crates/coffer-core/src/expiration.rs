//! Entry lifetimes.

use std::time::Duration;

/// How long a cache entry lives.
///
/// `Default` is resolved by the store to its configured default expiration
/// before a driver sees it. A driver that receives `Default` (or
/// `After(Duration::ZERO)`) applies its backend default, which every driver
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Expiration {
    /// The entry never expires.
    Never,
    /// The entry expires after the given duration.
    After(Duration),
    /// Use the container's default expiration.
    #[default]
    Default,
}

impl Expiration {
    /// Creates an expiration from a number of seconds.
    #[must_use]
    pub const fn secs(secs: u64) -> Self {
        Self::After(Duration::from_secs(secs))
    }

    /// Replaces `Default` with `After(default)`; other variants are kept.
    #[must_use]
    pub const fn or(self, default: Duration) -> Self {
        match self {
            Self::Default => Self::After(default),
            other => other,
        }
    }

    /// Returns the positive lifetime, or `None` when the backend default or
    /// no expiry applies.
    #[must_use]
    pub fn ttl(self) -> Option<Duration> {
        match self {
            Self::After(d) if !d.is_zero() => Some(d),
            _ => None,
        }
    }
}

impl From<Duration> for Expiration {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}
