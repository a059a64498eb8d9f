//! Store configuration structures.

use coffer_core::CacheError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Prefix applied when none is configured.
pub const DEFAULT_PREFIX: &str = "cache_";

/// Expiration applied by `put_default` when none is configured (1 hour).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(3600);

/// Background eviction period when none is configured (1 hour).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Redis address used when none is configured.
pub const DEFAULT_REDIS_ADDRESS: &str = "localhost:6379";

/// SQL database used when none is configured.
pub const DEFAULT_SQL_URL: &str = "sqlite://coffer-cache.db";

/// SQL table used when none is configured.
pub const DEFAULT_SQL_TABLE: &str = "coffer_cache";

/// Storage backend behind a store.
///
/// Deserializes through [`FromStr`], so configuration files and environment
/// variables accept the same case-insensitive names and aliases as `parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BackendKind {
    /// In-process expiring table.
    #[default]
    Memory,
    /// Remote Redis server (alias `network`).
    Redis,
    /// Relational table, SQLite (aliases `relational`, `sqlite`).
    Sql,
}

impl BackendKind {
    /// Returns the canonical backend name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Sql => "sql",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" | "network" => Ok(Self::Redis),
            "sql" | "relational" | "sqlite" => Ok(Self::Sql),
            other => Err(CacheError::configuration(format!(
                "Unknown backend kind '{other}' (expected memory, redis or sql)"
            ))),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whole seconds, rounding any fraction up so a sub-second duration does not
/// collapse to zero (which counts as unset).
fn whole_secs_ceil(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Root store configuration.
///
/// Unset fields are resolved to fixed defaults by the accessor methods; a
/// zero expiration or cleanup interval counts as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to construct.
    pub backend: BackendKind,
    /// Key prefix; `None` selects [`DEFAULT_PREFIX`].
    pub prefix: Option<String>,
    /// Default expiration in seconds.
    pub expiration_secs: Option<u64>,
    /// Background cleanup interval in seconds (memory and SQL backends).
    pub cleanup_interval_secs: Option<u64>,
    /// Redis connection settings.
    pub redis: RedisSettings,
    /// SQL connection settings.
    pub sql: SqlSettings,
}

impl StoreConfig {
    /// Creates a configuration for `backend` with every other field unset.
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the default expiration, rounded up to whole seconds.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration_secs = Some(whole_secs_ceil(expiration));
        self
    }

    /// Sets the background cleanup interval, rounded up to whole seconds.
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_secs = Some(whole_secs_ceil(interval));
        self
    }

    /// Returns the resolved key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Returns the resolved default expiration.
    #[must_use]
    pub fn expiration(&self) -> Duration {
        match self.expiration_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_EXPIRATION,
        }
    }

    /// Returns the resolved cleanup interval.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        match self.cleanup_interval_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// `host:port`; `None` selects [`DEFAULT_REDIS_ADDRESS`].
    pub address: Option<String>,
    /// Password, if the server requires one.
    pub password: Option<String>,
    /// Logical database index.
    pub db: u32,
    /// Connection pool size.
    pub pool_size: usize,
    /// Connect and pool wait timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            address: None,
            password: None,
            db: 0,
            pool_size: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl RedisSettings {
    /// Returns the resolved server address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_REDIS_ADDRESS)
    }

    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the connection URL from address, password and database index.
    pub fn url(&self) -> Result<String, CacheError> {
        let address = self.address();
        let mut url = Url::parse(&format!("redis://{address}")).map_err(|e| {
            CacheError::configuration(format!("Invalid Redis address '{address}': {e}"))
        })?;

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password)).map_err(|()| {
                CacheError::configuration(format!("Redis address '{address}' cannot carry a password"))
            })?;
        }
        url.set_path(&format!("/{}", self.db));

        Ok(url.into())
    }
}

/// SQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlSettings {
    /// Database URL; `None` selects [`DEFAULT_SQL_URL`].
    pub url: Option<String>,
    /// Table holding the entries; `None` selects [`DEFAULT_SQL_TABLE`].
    pub table: Option<String>,
    /// Maximum connection pool size.
    pub max_connections: u32,
    /// Pool acquire timeout in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            url: None,
            table: None,
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl SqlSettings {
    /// Returns the resolved database URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_SQL_URL)
    }

    /// Returns the resolved table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_SQL_TABLE)
    }

    /// Returns the acquire timeout as a Duration.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Returns true when the URL names an in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        let url = self.url();
        url.contains(":memory:") || url.contains("mode=memory")
    }
}
