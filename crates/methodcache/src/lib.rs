//! # methodcache
//!
//! Memoize the results of method calls by name and arguments.
//!
//! ## Architecture
//! - **Target**: object that dispatches method calls by name
//! - **Key resolution**: `<method>_key` first, then the target's generic builder
//! - **MethodCache**: proxy that turns a call into `fetch`, `read` or `write`
//!   against a [`memostore::Store`]
//! - **MethodCacher / Config**: injected store handle and once-only defaults
//!
//! ```ignore
//! let cacher = MethodCacher::new(MemoryStore::new(1_000));
//!
//! // computed once, then served from the store
//! cacher.cache(&user).invoke("expensive", vec![json!(22)])?;
//!
//! // refresh, then read back without running the method
//! cacher.cache_with(&user, CacheOperation::Write).invoke("expensive", vec![json!(22)])?;
//! cacher.cache_with(&user, CacheOperation::Read).invoke("expensive", vec![json!(22)])?;
//! ```

#![warn(missing_docs)]

mod cacher;
mod config;
mod error;
mod key;
mod operation;
mod proxy;
mod target;

pub use cacher::MethodCacher;
pub use config::{default_key_format, default_store, install_default_store, Config};
pub use error::{Error, NoMethodError, Result};
pub use key::{render_arg, resolve_key, KeyCase, KeyFormat, KeyRequest};
pub use operation::{CacheOperation, CacheRequest};
pub use proxy::MethodCache;
pub use target::{Cacheable, Target};

pub use memostore::{CacheOptions, MemoryStore, Store, StoreConfig, Value};
