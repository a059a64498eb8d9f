//! Common test infrastructure for Redis integration tests.

use coffer_config::RedisSettings;
use coffer_driver::RedisDriver;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

/// Test Redis container wrapper.
///
/// Manages a Redis testcontainer lifecycle and hands out drivers bound to
/// its logical databases.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    address: String,
}

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        Self {
            _container: container,
            address: format!("127.0.0.1:{}", port),
        }
    }

    /// Returns a driver bound to logical database `db`.
    pub fn driver(&self, db: u32) -> RedisDriver {
        let settings = RedisSettings {
            address: Some(self.address.clone()),
            db,
            pool_size: 4,
            ..RedisSettings::default()
        };
        RedisDriver::connect(&settings).expect("Failed to create Redis driver")
    }
}
