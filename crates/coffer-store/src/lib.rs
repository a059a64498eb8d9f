//! # Coffer Store
//!
//! The application-facing cache. A [`Store`] namespaces every key with its
//! prefix, fills in its default expiration where callers omit one, and
//! delegates to a single backend [`Driver`] bound at construction.
//! [`StoreFactory`] builds stores from a [`StoreConfig`].
//!
//! ```no_run
//! use coffer_store::{new_store, BackendKind, StoreConfig};
//!
//! # async fn run() -> coffer_store::CacheResult<()> {
//! let store = new_store(&StoreConfig::new(BackendKind::Memory)).await?;
//! store.put_default("session:42", "alice").await;
//! let user: String = store.get_scan("session:42").await?;
//! assert_eq!(user, "alice");
//! # Ok(())
//! # }
//! ```

mod container;
mod factory;

pub use container::Store;
pub use factory::{new_store, StoreFactory};

pub use coffer_config::{BackendKind, StoreConfig};
pub use coffer_core::{
    CacheError, CacheResult, CacheValue, Driver, DriverExt, Expiration, NumericOpFailure, Scan,
    ScanError,
};
