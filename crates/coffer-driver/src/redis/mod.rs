//! Redis adapter.
//!
//! Values travel in their wire encoding and come back as text, so `get`
//! yields `CacheValue::String` (or `Bytes` for non-UTF-8 payloads) and typed
//! reads go through the shared scan coercion. `Expiration::Never`,
//! `Expiration::Default` and zero durations store without expiry.
//!
//! `flush` issues `FLUSHDB`: it clears the whole logical database the pool is
//! bound to, including keys of every other prefix sharing that database.

use async_trait::async_trait;
use coffer_config::RedisSettings;
use coffer_core::{
    CacheError, CacheResult, CacheValue, Driver, Expiration, NumericOpFailure,
};
use deadpool_redis::redis::{self, AsyncCommands, ErrorKind, RedisError, Script};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::{debug, info};

/// Adds to an existing key only, so a missing key fails instead of being
/// created with the step as its value.
const INCRBY_EXISTING: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
return redis.call('INCRBY', KEYS[1], ARGV[1])
";

const DECRBY_EXISTING: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
return redis.call('DECRBY', KEYS[1], ARGV[1])
";

/// Redis-backed driver over a connection pool.
pub struct RedisDriver {
    pool: Pool,
    incr_script: Script,
    decr_script: Script,
}

impl RedisDriver {
    /// Creates a driver from connection settings.
    ///
    /// Connections are opened lazily on first use; the configured connect
    /// timeout bounds both connection creation and pool waits.
    pub fn connect(settings: &RedisSettings) -> CacheResult<Self> {
        let url = settings.url()?;
        let timeout = settings.connect_timeout();

        let mut pool_config = PoolConfig::new(settings.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut config = Config::from_url(url);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::backend(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            address = settings.address(),
            db = settings.db,
            pool_size = settings.pool_size,
            "Redis pool created"
        );
        Ok(Self::with_pool(pool))
    }

    /// Creates a driver over an existing pool.
    #[must_use]
    pub fn with_pool(pool: Pool) -> Self {
        Self {
            pool,
            incr_script: Script::new(INCRBY_EXISTING),
            decr_script: Script::new(DECRBY_EXISTING),
        }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Get a connection from the pool.
    async fn conn(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::backend(format!("Failed to get Redis connection: {}", e)))
    }

    async fn adjust(&self, script: &Script, key: &str, step: i64) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let result: Option<i64> = script
            .key(key)
            .arg(step)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| numeric_error(key, &e))?;

        match result {
            Some(value) => {
                debug!("Adjusted key '{}' to {}", key, value);
                Ok(())
            }
            None => Err(CacheError::numeric(key, NumericOpFailure::NotFound)),
        }
    }

    async fn try_put(&self, key: &str, payload: &[u8], expiration: Expiration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let result = match expiry_millis(expiration) {
            Some(millis) => conn.pset_ex::<_, _, ()>(key, payload, millis).await,
            None => conn.set::<_, _, ()>(key, payload).await,
        };
        result.map_err(|e| CacheError::backend(format!("Failed to set key '{}': {}", key, e)))
    }

    async fn try_forget(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to delete key '{}': {}", key, e)))?;
        Ok(deleted > 0)
    }

    async fn try_has(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let count: i64 = conn
            .exists(key)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to check key '{}': {}", key, e)))?;
        Ok(count > 0)
    }

    async fn try_flush(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisDriver")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for RedisDriver {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let mut conn = self.conn().await?;
        let raw: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to get key '{}': {}", key, e)))?;

        match &raw {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }

        Ok(raw.map(CacheValue::from_raw))
    }

    async fn put(&self, key: &str, value: CacheValue, expiration: Expiration) -> bool {
        let payload = value.to_wire();
        match self.try_put(key, &payload, expiration).await {
            Ok(()) => {
                debug!("Cached key '{}' with expiry {:?}", key, expiry_millis(expiration));
                true
            }
            Err(e) => failed("put", &e),
        }
    }

    async fn increment(&self, key: &str, step: i64) -> CacheResult<()> {
        self.adjust(&self.incr_script, key, step).await
    }

    async fn decrement(&self, key: &str, step: i64) -> CacheResult<()> {
        self.adjust(&self.decr_script, key, step).await
    }

    async fn forget(&self, key: &str) -> bool {
        self.try_forget(key).await.unwrap_or_else(|e| failed("forget", &e))
    }

    async fn has(&self, key: &str) -> bool {
        self.try_has(key).await.unwrap_or_else(|e| failed("has", &e))
    }

    async fn flush(&self) -> bool {
        match self.try_flush().await {
            Ok(()) => {
                debug!("Flushed Redis database");
                true
            }
            Err(e) => failed("flush", &e),
        }
    }
}

/// Reports a failure behind a boolean result.
fn failed(operation: &str, err: &CacheError) -> bool {
    debug!(operation, error = %err, "Redis operation reported false");
    false
}

/// Milliseconds for `PSETEX`, or `None` to store without expiry.
fn expiry_millis(expiration: Expiration) -> Option<u64> {
    expiration
        .ttl()
        .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
}

/// Maps a script failure: server-side command errors mean the stored value
/// could not be adjusted, anything else is the backend.
fn numeric_error(key: &str, err: &RedisError) -> CacheError {
    match err.kind() {
        ErrorKind::ResponseError | ErrorKind::ExtensionError | ErrorKind::TypeError => {
            let reason = if err.to_string().contains("overflow") {
                NumericOpFailure::Overflow
            } else {
                NumericOpFailure::NotNumeric
            };
            CacheError::numeric(key, reason)
        }
        _ => CacheError::backend(format!("Failed to adjust key '{}': {}", key, err)),
    }
}
