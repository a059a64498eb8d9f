//! The prefixing, defaulting store over one driver.

use coffer_core::{
    CacheError, CacheResult, CacheValue, Driver, DriverExt, Expiration, Scan, ScanError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache facade bound to one driver.
///
/// Every key is prefixed exactly once here; drivers only ever see the
/// namespaced form. `Expiration::Default` is replaced by the store's default
/// expiration before it reaches the driver.
///
/// The store holds no mutable state, so it can be shared freely. Two stores
/// may share a driver on purpose; they are then isolated by prefix only, and
/// `flush` clears the driver's whole scope for both.
#[derive(Clone)]
pub struct Store {
    prefix: String,
    default_expiration: Duration,
    driver: Arc<dyn Driver>,
}

impl Store {
    /// Binds a driver with a prefix and default expiration.
    #[must_use]
    pub fn new(
        driver: Arc<dyn Driver>,
        prefix: impl Into<String>,
        default_expiration: Duration,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            default_expiration,
            driver,
        }
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the expiration applied when callers omit one.
    #[must_use]
    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    /// Returns the underlying driver, which works on namespaced keys.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Fetches a value; `Ok(None)` when missing or expired.
    pub async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        self.driver.get(&self.namespaced(key)).await
    }

    /// Fetches a value coerced into `T`.
    pub async fn get_scan<T: Scan>(&self, key: &str) -> CacheResult<T> {
        self.driver.get_scan(&self.namespaced(key)).await
    }

    /// Fetches a value, or returns `default` when it is absent.
    pub async fn get_default(
        &self,
        key: &str,
        default: impl Into<CacheValue> + Send,
    ) -> CacheResult<CacheValue> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.into()))
    }

    /// Fetches a value coerced into `T`, or returns `default` when it is
    /// absent. Type mismatches and backend errors still propagate.
    pub async fn get_scan_default<T: Scan>(&self, key: &str, default: T) -> CacheResult<T> {
        match self.get_scan(key).await {
            Err(CacheError::Scan(ScanError::Missing { .. })) => Ok(default),
            other => other,
        }
    }

    /// Fetches each key in turn, keyed by the unprefixed key.
    ///
    /// A fetch that fails is recorded as absent and does not stop the rest.
    pub async fn many<I, K>(&self, keys: I) -> HashMap<String, Option<CacheValue>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut values = HashMap::new();
        for key in keys {
            let key = key.as_ref();
            let value = self.get(key).await.unwrap_or_else(|e| {
                debug!(key, error = %e, "Fetch failed in batch; recorded as absent");
                None
            });
            values.insert(key.to_string(), value);
        }
        values
    }

    /// Stores a value.
    pub async fn put(
        &self,
        key: &str,
        value: impl Into<CacheValue> + Send,
        expiration: impl Into<Expiration> + Send,
    ) -> bool {
        let expiration = expiration.into().or(self.default_expiration);
        self.driver
            .put(&self.namespaced(key), value.into(), expiration)
            .await
    }

    /// Stores a value with the default expiration.
    pub async fn put_default(&self, key: &str, value: impl Into<CacheValue> + Send) -> bool {
        self.put(key, value, Expiration::Default).await
    }

    /// Stores entries in order, stopping at the first failed write.
    ///
    /// Entries written before the failure stay written.
    pub async fn put_many<I, K, V>(
        &self,
        entries: I,
        expiration: impl Into<Expiration> + Send,
    ) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue> + Send,
    {
        let expiration = expiration.into();
        for (key, value) in entries {
            let key = key.as_ref();
            if !self.put(key, value, expiration).await {
                debug!(key, "Batch write aborted");
                return false;
            }
        }
        true
    }

    /// Stores entries in order with the default expiration.
    pub async fn put_many_default<I, K, V>(&self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue> + Send,
    {
        self.put_many(entries, Expiration::Default).await
    }

    /// Stores a value only if the key is absent, returning false otherwise.
    ///
    /// The check and the write are separate calls: two racing callers can
    /// both see the key absent and both write, the last write winning.
    pub async fn add(
        &self,
        key: &str,
        value: impl Into<CacheValue> + Send,
        expiration: impl Into<Expiration> + Send,
    ) -> bool {
        if self.has(key).await {
            return false;
        }
        self.put(key, value, expiration).await
    }

    /// Like [`add`](Self::add) with the default expiration.
    pub async fn add_default(&self, key: &str, value: impl Into<CacheValue> + Send) -> bool {
        self.add(key, value, Expiration::Default).await
    }

    pub async fn increment(&self, key: &str, step: i64) -> CacheResult<()> {
        self.driver.increment(&self.namespaced(key), step).await
    }

    pub async fn decrement(&self, key: &str, step: i64) -> CacheResult<()> {
        self.driver.decrement(&self.namespaced(key), step).await
    }

    /// Stores a string that never expires.
    pub async fn forever(&self, key: &str, value: &str) -> bool {
        self.driver.forever(&self.namespaced(key), value).await
    }

    pub async fn forget(&self, key: &str) -> bool {
        self.driver.forget(&self.namespaced(key)).await
    }

    pub async fn has(&self, key: &str) -> bool {
        self.driver.has(&self.namespaced(key)).await
    }

    /// Clears the driver's whole scope, not just this prefix.
    pub async fn flush(&self) -> bool {
        self.driver.flush().await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("driver", &self.driver.name())
            .field("prefix", &self.prefix)
            .field("default_expiration", &self.default_expiration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coffer_core::NumericOpFailure;
    use mockall::mock;
    use mockall::predicate::{always, eq};

    mock! {
        pub Backend {}

        #[async_trait]
        impl Driver for Backend {
            fn name(&self) -> &'static str;
            async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>>;
            async fn put(&self, key: &str, value: CacheValue, expiration: Expiration) -> bool;
            async fn increment(&self, key: &str, step: i64) -> CacheResult<()>;
            async fn decrement(&self, key: &str, step: i64) -> CacheResult<()>;
            async fn forget(&self, key: &str) -> bool;
            async fn has(&self, key: &str) -> bool;
            async fn flush(&self) -> bool;
        }
    }

    fn store(mock: MockBackend) -> Store {
        Store::new(Arc::new(mock), "p_", Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_keys_are_prefixed_once() {
        let mut mock = MockBackend::new();
        mock.expect_put()
            .with(eq("p_x"), eq(CacheValue::from("v")), eq(Expiration::secs(60)))
            .times(1)
            .returning(|_, _, _| true);
        mock.expect_get()
            .with(eq("p_x"))
            .times(1)
            .returning(|_| Ok(Some(CacheValue::from("v"))));
        mock.expect_increment()
            .with(eq("p_n"), eq(2))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_decrement()
            .with(eq("p_n"), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_forget().with(eq("p_x")).times(1).returning(|_| true);
        mock.expect_has().with(eq("p_x")).times(1).returning(|_| false);

        let store = store(mock);
        assert!(store.put("x", "v", Expiration::secs(60)).await);
        assert_eq!(store.get("x").await.unwrap(), Some(CacheValue::from("v")));
        store.increment("n", 2).await.unwrap();
        store.decrement("n", 3).await.unwrap();
        assert!(store.forget("x").await);
        assert!(!store.has("x").await);
    }

    #[tokio::test]
    async fn test_default_expiration_is_resolved() {
        let mut mock = MockBackend::new();
        mock.expect_put()
            .with(eq("p_a"), always(), eq(Expiration::secs(3600)))
            .times(2)
            .returning(|_, _, _| true);
        mock.expect_put()
            .with(eq("p_f"), eq(CacheValue::from("v")), eq(Expiration::Never))
            .times(1)
            .returning(|_, _, _| true);

        let store = store(mock);
        assert!(store.put_default("a", 1).await);
        assert!(store.put("a", 2, Expiration::Default).await);
        assert!(store.forever("f", "v").await);
    }

    #[tokio::test]
    async fn test_put_many_aborts_on_first_failure() {
        let mut mock = MockBackend::new();
        mock.expect_put()
            .with(eq("p_a"), always(), always())
            .times(1)
            .returning(|_, _, _| true);
        mock.expect_put()
            .with(eq("p_b"), always(), always())
            .times(1)
            .returning(|_, _, _| false);
        mock.expect_put()
            .with(eq("p_c"), always(), always())
            .never();

        let store = store(mock);
        assert!(!store.put_many([("a", 1), ("b", 2), ("c", 3)], Expiration::Default).await);
    }

    #[tokio::test]
    async fn test_many_records_failures_as_absent() {
        let mut mock = MockBackend::new();
        mock.expect_get()
            .with(eq("p_a"))
            .returning(|_| Ok(Some(CacheValue::Int(1))));
        mock.expect_get()
            .with(eq("p_b"))
            .returning(|_| Err(CacheError::backend("connection reset")));
        mock.expect_get().with(eq("p_c")).returning(|_| Ok(None));

        let store = store(mock);
        let values = store.many(["a", "b", "c"]).await;
        assert_eq!(values.len(), 3);
        assert_eq!(values["a"], Some(CacheValue::Int(1)));
        assert_eq!(values["b"], None);
        assert_eq!(values["c"], None);
    }

    #[tokio::test]
    async fn test_add_skips_existing_key() {
        let mut mock = MockBackend::new();
        mock.expect_has().with(eq("p_k")).times(1).returning(|_| true);
        mock.expect_put().never();

        let store = store(mock);
        assert!(!store.add_default("k", "v").await);
    }

    #[tokio::test]
    async fn test_default_only_on_absence() {
        let mut mock = MockBackend::new();
        mock.expect_get().with(eq("p_missing")).returning(|_| Ok(None));
        mock.expect_get()
            .with(eq("p_word"))
            .returning(|_| Ok(Some(CacheValue::from("abc"))));
        mock.expect_get()
            .with(eq("p_down"))
            .returning(|_| Err(CacheError::backend("unreachable")));

        let store = store(mock);
        assert_eq!(
            store.get_default("missing", "guest").await.unwrap(),
            CacheValue::from("guest")
        );
        assert_eq!(store.get_scan_default("missing", 7_i64).await.unwrap(), 7);

        let err = store.get_scan_default("word", 7_i64).await.unwrap_err();
        assert!(matches!(err, CacheError::Scan(ScanError::TypeMismatch { .. })));
        assert!(store.get_default("down", "guest").await.is_err());
        assert!(store.get_scan_default("down", 7_i64).await.is_err());
    }

    /// Reports every key absent, but only once both callers have checked.
    struct RacingDriver {
        checked: tokio::sync::Barrier,
        writes: std::sync::Mutex<Vec<CacheValue>>,
    }

    #[async_trait]
    impl Driver for RacingDriver {
        fn name(&self) -> &'static str {
            "racing"
        }

        async fn get(&self, _key: &str) -> CacheResult<Option<CacheValue>> {
            Ok(self.writes.lock().unwrap().last().cloned())
        }

        async fn put(&self, _key: &str, value: CacheValue, _expiration: Expiration) -> bool {
            self.writes.lock().unwrap().push(value);
            true
        }

        async fn increment(&self, _key: &str, _step: i64) -> CacheResult<()> {
            Ok(())
        }

        async fn decrement(&self, _key: &str, _step: i64) -> CacheResult<()> {
            Ok(())
        }

        async fn forget(&self, _key: &str) -> bool {
            false
        }

        async fn has(&self, _key: &str) -> bool {
            self.checked.wait().await;
            false
        }

        async fn flush(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_concurrent_adds_can_both_write() {
        let driver = Arc::new(RacingDriver {
            checked: tokio::sync::Barrier::new(2),
            writes: std::sync::Mutex::new(Vec::new()),
        });
        let store = Store::new(driver.clone(), "p_", Duration::from_secs(60));

        let (first, second) = tokio::join!(
            store.add("k", "v1", Expiration::Default),
            store.add("k", "v2", Expiration::Default)
        );

        assert!(first && second);
        let writes = driver.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(store.get("k").await.unwrap(), writes.last().cloned());
    }

    #[tokio::test]
    async fn test_numeric_errors_propagate() {
        let mut mock = MockBackend::new();
        mock.expect_increment()
            .returning(|key, _| Err(CacheError::numeric(key, NumericOpFailure::NotFound)));

        let store = store(mock);
        let err = store.increment("n", 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_flush_passes_through() {
        let mut mock = MockBackend::new();
        mock.expect_flush().times(1).returning(|| true);
        mock.expect_name().return_const("mock");

        let store = store(mock);
        assert!(store.flush().await);
        assert!(format!("{:?}", store).contains("mock"));
    }
}
