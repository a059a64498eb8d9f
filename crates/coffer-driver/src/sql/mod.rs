//! Relational adapter over SQLite.
//!
//! One table holds every entry:
//!
//! ```sql
//! CREATE TABLE coffer_cache (
//!     cache_key  TEXT PRIMARY KEY,
//!     kind       TEXT NOT NULL,
//!     payload    BLOB NOT NULL,
//!     expires_at INTEGER NULL
//! )
//! ```
//!
//! `payload` is the value's wire encoding and `kind` its variant, so reads
//! decode back to the exact [`CacheValue`] that was stored. `expires_at` is
//! unix milliseconds; `NULL` never expires. `flush` deletes every row of the
//! table, whatever the prefix.

mod queries;

use async_trait::async_trait;
use chrono::Utc;
use coffer_config::SqlSettings;
use coffer_core::{
    decrement_delta, CacheError, CacheResult, CacheValue, Driver, Expiration, NumericOpFailure,
    ValueKind,
};
use queries::Queries;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Database row representation of an entry.
#[derive(Debug, FromRow)]
struct EntryRow {
    kind: String,
    payload: Vec<u8>,
    expires_at: Option<i64>,
}

impl EntryRow {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }

    fn decode(&self, key: &str) -> CacheResult<CacheValue> {
        let corrupt = || CacheError::backend(format!("Corrupt cache entry for key '{}'", key));
        let kind = ValueKind::from_str(&self.kind).map_err(|_| corrupt())?;
        CacheValue::from_wire(kind, &self.payload).ok_or_else(corrupt)
    }
}

/// SQLite-backed driver.
pub struct SqlDriver {
    pool: SqlitePool,
    queries: Arc<Queries>,
    default_expiration: Duration,
    janitor: Option<JoinHandle<()>>,
}

impl SqlDriver {
    /// Connects, creates the entry table if needed and starts the janitor.
    ///
    /// `default_expiration` applies to entries stored with
    /// `Expiration::Default` or a zero duration; zero means never expire.
    /// A zero `cleanup_interval` disables the janitor.
    pub async fn connect(
        settings: &SqlSettings,
        default_expiration: Duration,
        cleanup_interval: Duration,
    ) -> CacheResult<Self> {
        info!("Connecting to SQLite cache database...");

        let options = SqliteConnectOptions::from_str(settings.url())
            .map_err(|e| {
                CacheError::configuration(format!("Invalid SQL url '{}': {}", settings.url(), e))
            })?
            .create_if_missing(true);

        // Every connection to an in-memory database opens a fresh database.
        let pool_options = if settings.is_in_memory() {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(settings.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!("Failed to connect to cache database: {}", e);
                CacheError::backend(format!("Failed to connect: {}", e))
            })?;

        let driver = Self::with_pool(pool, settings.table(), default_expiration, cleanup_interval)?;
        driver.create_table().await?;

        info!(table = settings.table(), "SQLite cache database ready");
        Ok(driver)
    }

    /// Creates a driver over an existing pool. The table must already exist
    /// or be created with [`create_table`](Self::create_table).
    pub fn with_pool(
        pool: SqlitePool,
        table: &str,
        default_expiration: Duration,
        cleanup_interval: Duration,
    ) -> CacheResult<Self> {
        let queries = Arc::new(Queries::for_table(table)?);
        let janitor = if cleanup_interval.is_zero() {
            None
        } else {
            spawn_janitor(pool.clone(), Arc::clone(&queries), cleanup_interval)
        };

        Ok(Self {
            pool,
            queries,
            default_expiration,
            janitor,
        })
    }

    /// Creates the entry table if it does not exist.
    pub async fn create_table(&self) -> CacheResult<()> {
        sqlx::query(&self.queries.create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to create cache table: {}", e)))?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.queries.table
    }

    /// Deletes expired rows, returning how many were removed.
    pub async fn delete_expired(&self) -> CacheResult<u64> {
        delete_expired(&self.pool, &self.queries).await
    }

    fn expires_at(&self, expiration: Expiration) -> Option<i64> {
        expiration.or(self.default_expiration).ttl().map(|ttl| {
            let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
            now_millis().saturating_add(millis)
        })
    }

    async fn adjust(&self, key: &str, delta: i64) -> CacheResult<()> {
        let backend = |e: sqlx::Error| {
            CacheError::backend(format!("Failed to adjust key '{}': {}", key, e))
        };

        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Take the write lock before reading, so concurrent adjusts serialize.
        sqlx::query(&self.queries.lock_row)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let row = sqlx::query_as::<_, EntryRow>(&self.queries.select)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .filter(|row| row.is_live(now_millis()))
            .ok_or_else(|| CacheError::numeric(key, NumericOpFailure::NotFound))?;

        let adjusted = row
            .decode(key)?
            .adjusted(delta)
            .map_err(|reason| CacheError::numeric(key, reason))?;

        sqlx::query(&self.queries.update_value)
            .bind(adjusted.kind().as_str())
            .bind(adjusted.to_wire())
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        debug!("Adjusted key '{}' by {}", key, delta);
        Ok(())
    }

    async fn try_put(&self, key: &str, value: &CacheValue, expiration: Expiration) -> CacheResult<()> {
        sqlx::query(&self.queries.upsert)
            .bind(key)
            .bind(value.kind().as_str())
            .bind(value.to_wire())
            .bind(self.expires_at(expiration))
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to set key '{}': {}", key, e)))?;
        Ok(())
    }

    async fn try_forget(&self, key: &str) -> CacheResult<bool> {
        let removed: Option<(Option<i64>,)> = sqlx::query_as(&self.queries.delete)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to delete key '{}': {}", key, e)))?;

        // An expired row is removed too, but it was not there to forget.
        Ok(removed.is_some_and(|(expires_at,)| expires_at.map_or(true, |at| now_millis() < at)))
    }

    async fn try_has(&self, key: &str) -> CacheResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as(&self.queries.exists)
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to check key '{}': {}", key, e)))?;
        Ok(found.is_some())
    }

    async fn try_flush(&self) -> CacheResult<u64> {
        let result = sqlx::query(&self.queries.flush)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to flush cache table: {}", e)))?;
        Ok(result.rows_affected())
    }
}

impl Drop for SqlDriver {
    fn drop(&mut self) {
        if let Some(janitor) = self.janitor.take() {
            janitor.abort();
        }
    }
}

impl std::fmt::Debug for SqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlDriver")
            .field("table", &self.queries.table)
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for SqlDriver {
    fn name(&self) -> &'static str {
        "sql"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let row = sqlx::query_as::<_, EntryRow>(&self.queries.select)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::backend(format!("Failed to get key '{}': {}", key, e)))?
            .filter(|row| row.is_live(now_millis()));

        match row {
            Some(row) => {
                debug!("Cache hit for key '{}'", key);
                row.decode(key).map(Some)
            }
            None => {
                debug!("Cache miss for key '{}'", key);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: CacheValue, expiration: Expiration) -> bool {
        match self.try_put(key, &value, expiration).await {
            Ok(()) => true,
            Err(e) => failed("put", &e),
        }
    }

    async fn increment(&self, key: &str, step: i64) -> CacheResult<()> {
        self.adjust(key, step).await
    }

    async fn decrement(&self, key: &str, step: i64) -> CacheResult<()> {
        let delta = decrement_delta(step).map_err(|reason| CacheError::numeric(key, reason))?;
        self.adjust(key, delta).await
    }

    async fn forget(&self, key: &str) -> bool {
        self.try_forget(key).await.unwrap_or_else(|e| failed("forget", &e))
    }

    async fn has(&self, key: &str) -> bool {
        self.try_has(key).await.unwrap_or_else(|e| failed("has", &e))
    }

    async fn flush(&self) -> bool {
        match self.try_flush().await {
            Ok(rows) => {
                debug!("Flushed {} rows from cache table", rows);
                true
            }
            Err(e) => failed("flush", &e),
        }
    }
}

fn failed(operation: &str, err: &CacheError) -> bool {
    debug!(operation, error = %err, "SQL operation reported false");
    false
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

async fn delete_expired(pool: &SqlitePool, queries: &Queries) -> CacheResult<u64> {
    let result = sqlx::query(&queries.delete_expired)
        .bind(now_millis())
        .execute(pool)
        .await
        .map_err(|e| CacheError::backend(format!("Failed to delete expired rows: {}", e)))?;
    Ok(result.rows_affected())
}

fn spawn_janitor(
    pool: SqlitePool,
    queries: Arc<Queries>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    let Ok(handle) = Handle::try_current() else {
        warn!("No tokio runtime; expired rows of '{}' are only hidden", queries.table);
        return None;
    };

    let Some(start) = Instant::now().checked_add(period) else {
        warn!(
            ?period,
            "Cleanup interval out of range; expired rows of '{}' are only hidden",
            queries.table
        );
        return None;
    };

    Some(handle.spawn(async move {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match delete_expired(&pool, &queries).await {
                Ok(0) => {}
                Ok(removed) => debug!("Evicted {} expired rows from '{}'", removed, queries.table),
                Err(e) => warn!("Cache table cleanup failed: {}", e),
            }
        }
    }))
}
