//! Process-wide configuration
//!
//! Defaults are resolved once at startup with [`Config::install`] (or
//! [`install_default_store`]) and are read-only afterwards.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use memostore::{MemoryStore, Store, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::key::KeyFormat;

struct Defaults {
    store: Arc<dyn Store>,
    key_format: KeyFormat,
}

static DEFAULTS: OnceLock<Defaults> = OnceLock::new();

/// Settings for the default store and key layout
///
/// ```json
/// { "store": { "capacity": 10000, "default_expires_in": 300 },
///   "key":   { "delimiter": ":", "case": "preserve" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// In-memory store settings
    pub store: StoreConfig,
    /// Layout of generated keys
    pub key: KeyFormat,
}

impl Config {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.store.capacity == 0 {
            return Err(Error::Config("store.capacity must be greater than 0".into()));
        }
        if self.key.delimiter.is_empty() {
            return Err(Error::Config("key.delimiter must not be empty".into()));
        }
        Ok(())
    }

    /// Build a store from these settings
    pub fn build_store(&self) -> MemoryStore {
        MemoryStore::with_config(&self.store)
    }

    /// Make these settings the process-wide defaults.
    ///
    /// Fails with [`Error::AlreadyConfigured`] on a second call.
    pub fn install(self) -> Result<Arc<MemoryStore>> {
        self.validate()?;
        let store = Arc::new(self.build_store());
        install_defaults(store.clone(), self.key)?;
        info!(
            capacity = self.store.capacity,
            default_expires_in = ?self.store.default_expires_in,
            "default method cache store installed"
        );
        Ok(store)
    }
}

/// Install an arbitrary store as the process-wide default
pub fn install_default_store(store: Arc<dyn Store>) -> Result<()> {
    install_defaults(store, KeyFormat::default())?;
    info!("default method cache store installed");
    Ok(())
}

fn install_defaults(store: Arc<dyn Store>, key_format: KeyFormat) -> Result<()> {
    DEFAULTS
        .set(Defaults { store, key_format })
        .map_err(|_| Error::AlreadyConfigured)
}

/// The process-wide default store
pub fn default_store() -> Result<Arc<dyn Store>> {
    DEFAULTS
        .get()
        .map(|defaults| Arc::clone(&defaults.store))
        .ok_or(Error::StoreNotConfigured)
}

/// The process-wide key layout, or the built-in one if none was installed.
///
/// Callers before and after [`Config::install`] can see different layouts,
/// so keys derived early may not match the ones derived once installed.
pub fn default_key_format() -> &'static KeyFormat {
    static BUILT_IN: OnceLock<KeyFormat> = OnceLock::new();
    match DEFAULTS.get() {
        Some(defaults) => &defaults.key_format,
        None => BUILT_IN.get_or_init(KeyFormat::default),
    }
}
