//! # Coffer Driver
//!
//! Backend adapters implementing [`coffer_core::Driver`]:
//!
//! - [`MemoryDriver`] over an in-process [`MemoryTable`]
//! - [`RedisDriver`] over a pooled Redis connection
//! - [`SqlDriver`] over a SQLite table
//!
//! Adapters translate the unified contract into native calls and map
//! backend failures into [`coffer_core::CacheError`]; they hold no
//! namespacing or defaulting logic.

pub mod memory;
pub mod redis;
pub mod sql;

pub use memory::{MemoryDriver, MemoryTable};
pub use self::redis::RedisDriver;
pub use sql::SqlDriver;
