//! # memostore
//!
//! Key/value store capability consumed by the method memoization layer.
//!
//! ## Architecture
//! - **Store**: object-safe trait with `fetch`, `read`, `write`, `delete`, `exists`
//! - **CacheOptions**: opaque option bag handed to the store verbatim
//! - **MemoryStore**: bounded LRU (AHash map + index-linked list) with
//!   per-key fill guards and hit/miss statistics

#![warn(missing_docs)]

mod error;
mod lru;
mod memory;
mod options;
mod stats;
mod store;

pub use error::{Error, Result};
pub use memory::{MemoryStore, StoreConfig};
pub use options::CacheOptions;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{Producer, Store};

/// Values stored and produced through a [`Store`].
pub use serde_json::Value;
