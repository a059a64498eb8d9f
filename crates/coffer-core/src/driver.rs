//! The contract every backend adapter implements.

use crate::{CacheResult, CacheValue, Expiration, Scan, ScanError};
use async_trait::async_trait;

/// Backend adapter contract.
///
/// Implementations translate these calls into backend-native operations and
/// own no logic beyond value encoding and error mapping. Keys passed in are
/// already namespaced by the store.
///
/// Absence is never an error: `get` returns `Ok(None)` and `has` returns
/// `false` for a missing or expired key. The boolean operations report any
/// failure, including an unreachable backend, as `false`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Fetches the value stored under `key`.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>>;

    /// Stores `value` under `key`.
    async fn put(&self, key: &str, value: CacheValue, expiration: Expiration) -> bool;

    /// Atomically adds `step` to the numeric value stored under `key`.
    async fn increment(&self, key: &str, step: i64) -> CacheResult<()>;

    /// Atomically subtracts `step` from the numeric value stored under `key`.
    async fn decrement(&self, key: &str, step: i64) -> CacheResult<()>;

    /// Stores a string that never expires.
    async fn forever(&self, key: &str, value: &str) -> bool {
        self.put(key, CacheValue::from(value), Expiration::Never).await
    }

    /// Deletes `key`, returning false when nothing was removed.
    async fn forget(&self, key: &str) -> bool;

    /// Reports whether a live entry exists under `key`.
    async fn has(&self, key: &str) -> bool;

    /// Removes every key in the driver's scope.
    async fn flush(&self) -> bool;
}

/// Typed reads available on every driver.
#[async_trait]
pub trait DriverExt: Driver {
    /// Fetches `key` and coerces it into `T`.
    ///
    /// Fails with [`ScanError::Missing`] when nothing is stored and with
    /// [`ScanError::TypeMismatch`] when the value cannot become a `T`.
    async fn get_scan<T: Scan>(&self, key: &str) -> CacheResult<T> {
        match self.get(key).await? {
            Some(value) => Ok(T::scan(&value)?),
            None => Err(ScanError::missing(key).into()),
        }
    }
}

impl<D: Driver + ?Sized> DriverExt for D {}
