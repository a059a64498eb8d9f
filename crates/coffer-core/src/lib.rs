//! # Coffer Core
//!
//! Core types, traits, and error definitions for Coffer.
//! Every backend adapter and the store facade are written against the
//! abstractions in this crate: the [`Driver`] contract, the closed
//! [`CacheValue`] set and the [`Scan`] coercion rules.

pub mod driver;
pub mod error;
pub mod expiration;
pub mod result;
pub mod scan;
pub mod value;

pub use driver::*;
pub use error::*;
pub use expiration::*;
pub use result::*;
pub use scan::*;
pub use value::*;
