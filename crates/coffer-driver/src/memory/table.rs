//! In-process expiring table.

use coffer_core::{CacheValue, Expiration, NumericOpFailure};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Concurrent map with per-entry expiration.
///
/// Expired entries are invisible to reads immediately and are physically
/// removed by [`delete_expired`](Self::delete_expired), which the janitor
/// task started by [`with_janitor`](Self::with_janitor) runs periodically.
/// Deadlines use the tokio clock.
///
/// The janitor lives on the runtime that started it. A table that outlives
/// that runtime is restarted on the caller's runtime by
/// [`ensure_janitor`](Self::ensure_janitor).
#[derive(Debug)]
pub struct MemoryTable {
    entries: RwLock<HashMap<String, Entry>>,
    default_expiration: Duration,
    cleanup_interval: Duration,
    janitor: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryTable {
    /// Creates a table without background eviction.
    ///
    /// `default_expiration` applies to entries stored with
    /// `Expiration::Default` or a zero duration; zero means never expire.
    #[must_use]
    pub fn new(default_expiration: Duration) -> Self {
        Self::with_cleanup_interval(default_expiration, Duration::ZERO)
    }

    fn with_cleanup_interval(default_expiration: Duration, cleanup_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_expiration,
            cleanup_interval,
            janitor: Mutex::new(None),
        }
    }

    /// Creates a shared table and starts its janitor on the current tokio
    /// runtime. The janitor stops once the last handle is dropped.
    #[must_use]
    pub fn with_janitor(default_expiration: Duration, cleanup_interval: Duration) -> Arc<Self> {
        let table = Arc::new(Self::with_cleanup_interval(default_expiration, cleanup_interval));
        table.ensure_janitor();
        table
    }

    /// Starts the janitor on the current runtime unless one is still running.
    ///
    /// Returns true when a janitor is running afterwards. Tables created
    /// with [`new`](Self::new) have no cleanup interval and never run one.
    pub fn ensure_janitor(self: &Arc<Self>) -> bool {
        let mut janitor = self.janitor.lock();
        if janitor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return true;
        }
        *janitor = spawn_janitor(Arc::downgrade(self), self.cleanup_interval);
        janitor.is_some()
    }

    /// Returns the default expiration.
    #[must_use]
    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    /// Returns the live value stored under `key`.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Reports whether a live entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Stores `value`, replacing any previous entry.
    pub fn set(&self, key: &str, value: CacheValue, expiration: Expiration) {
        let expires_at = self.deadline(expiration);
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    /// Removes `key`, returning true when a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Adds `delta` to the numeric value under `key` while holding the write
    /// lock. The entry keeps its deadline.
    pub fn adjust(&self, key: &str, delta: i64) -> Result<(), NumericOpFailure> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .filter(|entry| entry.is_live(now))
            .ok_or(NumericOpFailure::NotFound)?;
        entry.value = entry.value.adjusted(delta)?;
        Ok(())
    }

    /// Removes every entry.
    pub fn flush(&self) {
        self.entries.write().clear();
    }

    /// Physically removes expired entries, returning how many were evicted.
    pub fn delete_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    fn deadline(&self, expiration: Expiration) -> Option<Instant> {
        let ttl = match expiration {
            Expiration::Never => return None,
            Expiration::After(d) if !d.is_zero() => d,
            _ if self.default_expiration.is_zero() => return None,
            _ => self.default_expiration,
        };
        // A deadline past the clock's range never arrives.
        Instant::now().checked_add(ttl)
    }
}

fn spawn_janitor(table: Weak<MemoryTable>, period: Duration) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!("No tokio runtime; memory table runs without background eviction");
        return None;
    };

    let Some(start) = Instant::now().checked_add(period) else {
        warn!(
            ?period,
            "Cleanup interval out of range; memory table runs without background eviction"
        );
        return None;
    };

    Some(handle.spawn(async move {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(table) = table.upgrade() else {
                break;
            };
            let evicted = table.delete_expired();
            if evicted > 0 {
                debug!(evicted, "Evicted expired memory entries");
            }
        }
    }))
}
