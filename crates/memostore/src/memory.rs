//! MemoryStore: bounded in-process store with expiry and per-key fill guards

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::lru::LruMap;
use crate::options::CacheOptions;
use crate::stats::StoreStats;
use crate::store::{Producer, Store};

/// Option naming an entry lifetime in seconds
const EXPIRES_IN: &str = "expires_in";

/// Option forcing `fetch` to recompute
const FORCE: &str = "force";

/// Settings for a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entries kept before LRU eviction
    pub capacity: usize,

    /// Lifetime in seconds applied when a call passes no `expires_in`
    pub default_expires_in: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            default_expires_in: None,
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory [`Store`] with LRU eviction.
///
/// `fetch` is atomic per key: racing callers for the same unset key queue on
/// one fill guard and run their producers one at a time, so after a successful
/// fill the rest are served the stored value. The guard stays registered while
/// anyone holds it. The entry map is not locked while a producer runs.
///
/// Understood options: `expires_in` (seconds, integer or float) and
/// `force` (`true` recomputes on `fetch`). Anything else is ignored.
/// A lifetime too large to represent means the entry never expires.
pub struct MemoryStore {
    entries: RwLock<LruMap<String, Entry>>,
    fills: Mutex<HashMap<String, Arc<Mutex<()>>, RandomState>>,
    stats: StoreStats,
    default_expires_in: Option<Duration>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self::with_config(&StoreConfig {
            capacity,
            ..StoreConfig::default()
        })
    }

    /// Create a store from settings
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            entries: RwLock::new(LruMap::new(config.capacity)),
            fills: Mutex::new(HashMap::with_hasher(RandomState::new())),
            stats: StoreStats::new(),
            default_expires_in: config.default_expires_in.map(Duration::from_secs),
        }
    }

    /// Get store statistics
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of entries held, including expired ones not yet dropped
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get store capacity
    pub fn capacity(&self) -> usize {
        self.entries.read().capacity()
    }

    /// Drop every entry and reset statistics
    pub fn clear(&self) {
        self.entries.write().clear();
        self.stats.reset();
    }

    fn expires_in(&self, options: &CacheOptions) -> Option<Duration> {
        match options.get(EXPIRES_IN).and_then(Value::as_f64) {
            Some(secs) if secs >= 0.0 => {
                Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
            }
            _ => self.default_expires_in,
        }
    }

    fn forced(options: &CacheOptions) -> bool {
        options.get(FORCE).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Live value at `key`; drops the entry if it has expired
    fn lookup(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.remove(key);
        self.stats.record_expiration();
        debug!(key, "expired entry dropped");
        None
    }

    fn insert(&self, key: &str, value: Value, options: &CacheOptions) {
        let expires_at = self
            .expires_in(options)
            .and_then(|ttl| Instant::now().checked_add(ttl));
        let evicted = self
            .entries
            .write()
            .put(key.to_string(), Entry { value, expires_at });

        self.stats.record_write();
        if let Some((evicted_key, _)) = evicted {
            self.stats.record_eviction();
            debug!(key = %evicted_key, "evicted least recently used entry");
        }
    }

    fn fill_guard(&self, key: &str) -> Arc<Mutex<()>> {
        self.fills
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Unregister `guard` unless another caller still holds a clone of it.
    /// Clones are only taken under the `fills` lock, so the count is stable here.
    fn release_fill_guard(&self, key: &str, guard: &Arc<Mutex<()>>) {
        let mut fills = self.fills.lock();
        let registered = fills.get(key).is_some_and(|current| Arc::ptr_eq(current, guard));
        if registered && Arc::strong_count(guard) == 2 {
            fills.remove(key);
        }
    }

    fn fill(
        &self,
        key: &str,
        options: &CacheOptions,
        force: bool,
        guard: &Arc<Mutex<()>>,
        producer: Producer<'_>,
    ) -> Result<Value> {
        let _filling = guard.lock();
        let outcome = self.fill_locked(key, options, force, producer);
        self.release_fill_guard(key, guard);
        outcome
    }

    fn fill_locked(
        &self,
        key: &str,
        options: &CacheOptions,
        force: bool,
        producer: Producer<'_>,
    ) -> Result<Value> {
        // Another caller may have filled the key while we waited.
        if !force {
            if let Some(value) = self.lookup(key) {
                self.stats.record_hit();
                debug!(key, "fetch hit after wait");
                return Ok(value);
            }
            self.stats.record_miss();
        }

        self.stats.record_fill();
        debug!(key, force, "fetch miss, running producer");
        let value = producer().map_err(Error::Producer)?;
        self.insert(key, value.clone(), options);
        Ok(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_config(&StoreConfig::default())
    }
}

impl Store for MemoryStore {
    fn fetch(&self, key: &str, options: &CacheOptions, producer: Producer<'_>) -> Result<Value> {
        let force = Self::forced(options);
        if !force {
            if let Some(value) = self.lookup(key) {
                self.stats.record_hit();
                debug!(key, "fetch hit");
                return Ok(value);
            }
        }

        let guard = self.fill_guard(key);
        self.fill(key, options, force, &guard, producer)
    }

    fn read(&self, key: &str, _options: &CacheOptions) -> Result<Option<Value>> {
        let value = self.lookup(key);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    fn write(&self, key: &str, value: Value, options: &CacheOptions) -> Result<Value> {
        self.insert(key, value.clone(), options);
        debug!(key, "value written");
        Ok(value)
    }

    fn delete(&self, key: &str, _options: &CacheOptions) -> Result<()> {
        let removed = self.entries.write().remove(key).is_some();
        self.stats.record_delete();
        debug!(key, removed, "entry deleted");
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read();
        Ok(entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_producer(calls: &AtomicUsize, value: Value) -> Producer<'_> {
        Box::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    #[test]
    fn test_fetch_runs_producer_once() {
        let store = MemoryStore::new(10);
        let calls = AtomicUsize::new(0);
        let options = CacheOptions::new();

        let first = store
            .fetch("users:foo:7", &options, counting_producer(&calls, json!("bar")))
            .unwrap();
        let second = store
            .fetch("users:foo:7", &options, counting_producer(&calls, json!("other")))
            .unwrap();

        assert_eq!(first, json!("bar"));
        assert_eq!(second, json!("bar"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().hits(), 1);
        assert_eq!(store.stats().misses(), 1);
        assert_eq!(store.stats().fills(), 1);
    }

    #[test]
    fn test_fetch_producer_failure_leaves_key_unset() {
        let store = MemoryStore::new(10);
        let options = CacheOptions::new();

        let err = store
            .fetch(
                "k",
                &options,
                Box::new(|| Err::<Value, _>(anyhow::anyhow!("db down"))),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Producer(_)));
        assert!(!store.exists("k").unwrap());
        assert!(store.fills.lock().is_empty());
    }

    #[test]
    fn test_fetch_force_recomputes() {
        let store = MemoryStore::new(10);
        let calls = AtomicUsize::new(0);

        store
            .fetch("k", &CacheOptions::new(), counting_producer(&calls, json!(1)))
            .unwrap();
        let forced = store
            .fetch(
                "k",
                &CacheOptions::new().with("force", true),
                counting_producer(&calls, json!(2)),
            )
            .unwrap();

        assert_eq!(forced, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.read("k", &CacheOptions::new()).unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_concurrent_fetch_fills_once() {
        let store = MemoryStore::new(10);
        let calls = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value = store
                        .fetch(
                            "slow",
                            &CacheOptions::new(),
                            Box::new(|| {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                Ok(json!("done"))
                            }),
                        )
                        .unwrap();
                    assert_eq!(value, json!("done"));
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().fills(), 1);
    }

    #[test]
    fn test_read_absent_and_present() {
        let store = MemoryStore::new(10);
        let options = CacheOptions::new();

        assert_eq!(store.read("k", &options).unwrap(), None);
        store.write("k", json!({"a": 1}), &options).unwrap();
        assert_eq!(store.read("k", &options).unwrap(), Some(json!({"a": 1})));

        assert_eq!(store.stats().misses(), 1);
        assert_eq!(store.stats().hits(), 1);
    }

    #[test]
    fn test_write_acknowledges_value() {
        let store = MemoryStore::new(10);
        let ack = store.write("k", json!("v"), &CacheOptions::new()).unwrap();
        assert_eq!(ack, json!("v"));
        assert_eq!(store.stats().writes(), 1);
    }

    #[test]
    fn test_delete_then_exists() {
        let store = MemoryStore::new(10);
        let options = CacheOptions::new();

        store.write("k", json!(1), &options).unwrap();
        assert!(store.exists("k").unwrap());

        store.delete("k", &options).unwrap();
        assert!(!store.exists("k").unwrap());

        // Deleting an absent key is fine
        store.delete("k", &options).unwrap();
        assert_eq!(store.stats().deletes(), 2);
    }

    #[test]
    fn test_expires_in_zero_reads_absent() {
        let store = MemoryStore::new(10);
        let options = CacheOptions::new().with("expires_in", 0);

        store.write("k", json!(1), &options).unwrap();

        assert!(!store.exists("k").unwrap());
        assert_eq!(store.read("k", &options).unwrap(), None);
        assert_eq!(store.stats().expirations(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_default_expiry_is_overridden_per_call() {
        let store = MemoryStore::with_config(&StoreConfig {
            capacity: 10,
            default_expires_in: Some(0),
        });

        store.write("short", json!(1), &CacheOptions::new()).unwrap();
        store
            .write("long", json!(2), &CacheOptions::new().with("expires_in", 3600))
            .unwrap();

        assert!(!store.exists("short").unwrap());
        assert!(store.exists("long").unwrap());
    }

    #[test]
    fn test_huge_expires_in_never_expires() {
        let store = MemoryStore::new(10);

        store
            .write("k", json!(1), &CacheOptions::new().with("expires_in", 1e30))
            .unwrap();

        assert!(store.exists("k").unwrap());
        assert_eq!(store.read("k", &CacheOptions::new()).unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_max_default_expiry_never_expires() {
        let store = MemoryStore::with_config(&StoreConfig {
            capacity: 10,
            default_expires_in: Some(u64::MAX),
        });

        store.write("k", json!(1), &CacheOptions::new()).unwrap();

        assert!(store.exists("k").unwrap());
        assert_eq!(store.stats().expirations(), 0);
    }

    #[test]
    fn test_negative_expires_in_uses_default() {
        let store = MemoryStore::with_config(&StoreConfig {
            capacity: 10,
            default_expires_in: Some(0),
        });

        store
            .write("k", json!(1), &CacheOptions::new().with("expires_in", -5))
            .unwrap();

        assert!(!store.exists("k").unwrap());
    }

    #[test]
    fn test_producers_never_overlap_after_failure() {
        let store = MemoryStore::new(10);
        let calls = AtomicUsize::new(0);
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..6 {
                scope.spawn(|| {
                    let _ = store.fetch(
                        "flaky",
                        &CacheOptions::new(),
                        Box::new(|| -> anyhow::Result<Value> {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(10));
                            active.fetch_sub(1, Ordering::SeqCst);

                            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                                anyhow::bail!("first fill fails");
                            }
                            Ok(json!("ok"))
                        }),
                    );
                });
            }
        });

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(store.read("flaky", &CacheOptions::new()).unwrap(), Some(json!("ok")));
        assert!(store.fills.lock().is_empty());
    }

    #[test]
    fn test_eviction_is_counted() {
        let store = MemoryStore::new(2);
        let options = CacheOptions::new();

        store.write("a", json!(1), &options).unwrap();
        store.write("b", json!(2), &options).unwrap();
        store.write("c", json!(3), &options).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.stats().evictions(), 1);
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::default();
        store.write("a", json!(1), &CacheOptions::new()).unwrap();

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.stats().writes(), 0);
    }

    #[test]
    fn test_store_config_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.capacity, 10_000);
    }
}
