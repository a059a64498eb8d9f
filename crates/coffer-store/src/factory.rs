//! Store construction from configuration.

use crate::Store;
use coffer_config::{validate, BackendKind, StoreConfig};
use coffer_core::{CacheResult, Driver};
use coffer_driver::{MemoryDriver, MemoryTable, RedisDriver, SqlDriver};
use std::sync::{Arc, OnceLock};
use tracing::info;

static GLOBAL: OnceLock<StoreFactory> = OnceLock::new();

/// Builds stores and owns the memory table they share.
///
/// Every memory store built by one factory uses the same table, created
/// with the expiration and cleanup interval of the first memory config the
/// factory sees. Flushing any of them clears the table for all.
///
/// The table's janitor runs on a tokio runtime. If that runtime shuts down,
/// the next memory `build` restarts the janitor on the caller's runtime;
/// until then expired entries stay hidden but are not evicted.
#[derive(Debug, Default)]
pub struct StoreFactory {
    memory: OnceLock<Arc<MemoryTable>>,
}

impl StoreFactory {
    /// Creates a factory with its own memory table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide factory.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Validates `config`, builds the driver for its backend and binds it
    /// into a store.
    pub async fn build(&self, config: &StoreConfig) -> CacheResult<Store> {
        validate(config).into_result()?;

        let driver: Arc<dyn Driver> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryDriver::new(self.memory_table(config))),
            BackendKind::Redis => Arc::new(RedisDriver::connect(&config.redis)?),
            BackendKind::Sql => Arc::new(
                SqlDriver::connect(&config.sql, config.expiration(), config.cleanup_interval())
                    .await?,
            ),
        };

        let store = Self::build_with_driver(config, driver);
        info!(
            backend = %config.backend,
            prefix = store.prefix(),
            "Cache store ready"
        );
        Ok(store)
    }

    /// Binds a supplied driver with the prefix and expiration of `config`.
    ///
    /// The backend settings in `config` are ignored.
    #[must_use]
    pub fn build_with_driver(config: &StoreConfig, driver: Arc<dyn Driver>) -> Store {
        Store::new(driver, config.prefix(), config.expiration())
    }

    fn memory_table(&self, config: &StoreConfig) -> Arc<MemoryTable> {
        let table = self.memory.get_or_init(|| {
            MemoryTable::with_janitor(config.expiration(), config.cleanup_interval())
        });
        // The runtime that started the janitor may be gone by now.
        table.ensure_janitor();
        Arc::clone(table)
    }
}

/// Builds a store with the process-wide factory.
pub async fn new_store(config: &StoreConfig) -> CacheResult<Store> {
    StoreFactory::global().build(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::{CacheError, CacheValue, DriverExt, Expiration};
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_stores_share_one_table() {
        let factory = StoreFactory::new();
        let first = factory
            .build(&StoreConfig::new(BackendKind::Memory).with_prefix("a_"))
            .await
            .unwrap();
        let second = factory
            .build(&StoreConfig::new(BackendKind::Memory).with_prefix("b_"))
            .await
            .unwrap();

        assert!(first.put_default("k", "1").await);
        assert!(second.put_default("k", "2").await);
        assert_eq!(first.get_scan::<String>("k").await.unwrap(), "1");
        assert_eq!(second.driver().get_scan::<String>("a_k").await.unwrap(), "1");

        assert!(first.flush().await);
        assert!(!second.has("k").await);
    }

    #[tokio::test]
    async fn test_separate_factories_do_not_share() {
        let config = StoreConfig::new(BackendKind::Memory);
        let first = StoreFactory::new().build(&config).await.unwrap();
        let second = StoreFactory::new().build(&config).await.unwrap();

        first.put_default("k", "v").await;
        assert!(!second.has("k").await);
    }

    #[tokio::test]
    async fn test_defaults_are_resolved() {
        let store = StoreFactory::new()
            .build(&StoreConfig::default())
            .await
            .unwrap();
        assert_eq!(store.prefix(), "cache_");
        assert_eq!(store.default_expiration(), Duration::from_secs(3600));
        assert_eq!(store.driver().name(), "memory");
    }

    #[tokio::test]
    async fn test_empty_prefix_is_kept() {
        let store = StoreFactory::new()
            .build(&StoreConfig::new(BackendKind::Memory).with_prefix(""))
            .await
            .unwrap();
        store.put_default("raw", 5).await;
        assert_eq!(store.prefix(), "");
        assert!(store.driver().has("raw").await);
    }

    #[tokio::test]
    async fn test_sql_backend() {
        let mut config = StoreConfig::new(BackendKind::Sql).with_prefix("s_");
        config.sql.url = Some("sqlite::memory:".to_string());

        let store = StoreFactory::new().build(&config).await.unwrap();
        assert_eq!(store.driver().name(), "sql");
        assert!(store.put("n", 41, Expiration::Never).await);
        store.increment("n", 1).await.unwrap();
        assert_eq!(store.get("n").await.unwrap(), Some(CacheValue::Int(42)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = StoreConfig::new(BackendKind::Redis);
        config.redis.address = Some("no-port".to_string());
        config.redis.pool_size = 0;

        let err = StoreFactory::new().build(&config).await.unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        let err = "cassandra".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_build_with_driver_reuses_driver() {
        let table = Arc::new(MemoryTable::new(Duration::from_secs(60)));
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new(table));
        let config = StoreConfig::new(BackendKind::Redis).with_prefix("x_");

        let store = StoreFactory::build_with_driver(&config, Arc::clone(&driver));
        assert!(Arc::ptr_eq(store.driver(), &driver));
        assert_eq!(store.prefix(), "x_");
    }

    #[test]
    fn test_build_restarts_janitor_on_new_runtime() {
        let factory = StoreFactory::new();
        let config = StoreConfig::new(BackendKind::Memory)
            .with_cleanup_interval(Duration::from_secs(60));

        let first = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        first.block_on(factory.build(&config)).unwrap();
        drop(first);

        let second = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        second.block_on(async {
            let store = factory.build(&config).await.unwrap();
            store.put("k", "v", Expiration::secs(5)).await;

            tokio::time::advance(Duration::from_secs(61)).await;
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            let table = factory.memory.get().unwrap();
            assert_eq!(table.entry_count(), 0);
        });
    }

    #[test]
    fn test_global_factory_is_shared() {
        assert!(std::ptr::eq(StoreFactory::global(), StoreFactory::global()));
    }
}
