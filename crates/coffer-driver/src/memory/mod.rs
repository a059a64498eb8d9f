//! In-process memory adapter.
//!
//! Values are kept as typed [`CacheValue`]s, so reads need no decoding.
//! `Expiration::Never` never expires; `Expiration::Default` and zero
//! durations use the table's default expiration.
//!
//! The table's scope is every store the table is shared with: `flush` wipes
//! all of them, whatever their prefixes.

mod table;

pub use table::MemoryTable;

use async_trait::async_trait;
use coffer_core::{decrement_delta, CacheError, CacheResult, CacheValue, Driver, Expiration};
use std::sync::Arc;
use tracing::debug;

/// Memory-backed driver.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    table: Arc<MemoryTable>,
}

impl MemoryDriver {
    /// Creates a driver over a (possibly shared) table.
    #[must_use]
    pub fn new(table: Arc<MemoryTable>) -> Self {
        Self { table }
    }

    /// Returns the underlying table.
    #[must_use]
    pub fn table(&self) -> &Arc<MemoryTable> {
        &self.table
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let value = self.table.get(key);
        match &value {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: CacheValue, expiration: Expiration) -> bool {
        self.table.set(key, value, expiration);
        true
    }

    async fn increment(&self, key: &str, step: i64) -> CacheResult<()> {
        self.table
            .adjust(key, step)
            .map_err(|reason| CacheError::numeric(key, reason))
    }

    async fn decrement(&self, key: &str, step: i64) -> CacheResult<()> {
        let delta = decrement_delta(step).map_err(|reason| CacheError::numeric(key, reason))?;
        self.table
            .adjust(key, delta)
            .map_err(|reason| CacheError::numeric(key, reason))
    }

    async fn forget(&self, key: &str) -> bool {
        self.table.delete(key)
    }

    async fn has(&self, key: &str) -> bool {
        self.table.contains(key)
    }

    async fn flush(&self) -> bool {
        self.table.flush();
        debug!("Flushed memory table");
        true
    }
}
