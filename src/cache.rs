//! Object cache used by the translation store and the link engine.
//!
//! The cache is injected rather than global: every service receives an
//! `Arc<dyn ObjectCache>` at construction. Entries are addressed by a `(group, key)`
//! pair so that callers can invalidate one family of keys without touching others.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use moka::sync::Cache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

pub trait ObjectCache: Send + Sync {
    fn get(&self, group: &str, key: &str) -> Option<Value>;
    fn set(&self, group: &str, key: &str, value: Value);
    fn delete(&self, group: &str, key: &str);
    /// Drop every key of a group.
    fn flush_group(&self, group: &str);
}

/// Typed read on top of [`ObjectCache::get`]. An entry that no longer deserializes
/// is treated as a miss.
pub fn get_typed<T: DeserializeOwned>(cache: &dyn ObjectCache, group: &str, key: &str) -> Option<T> {
    let value = cache.get(group, key)?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            warn!("Discarding unreadable cache entry {}/{}: {}", group, key, e);
            cache.delete(group, key);
            None
        }
    }
}

/// Typed write on top of [`ObjectCache::set`].
pub fn set_typed<T: Serialize>(cache: &dyn ObjectCache, group: &str, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => cache.set(group, key, value),
        Err(e) => warn!("Not caching {}/{}: {}", group, key, e),
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl ObjectCache for NullCache {
    fn get(&self, _group: &str, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _group: &str, _key: &str, _value: Value) {}

    fn delete(&self, _group: &str, _key: &str) {}

    fn flush_group(&self, _group: &str) {}
}

/// Entry limit of [`MemoryCache::new`] and [`MemoryCache::with_ttl`]
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Process-local cache with a size bound and an optional time-to-live.
///
/// Link keys are derived from request URLs, so the number of distinct keys is not
/// under our control. Once `max_entries` is reached, moka evicts the entries least
/// likely to be read again.
pub struct MemoryCache {
    entries: Cache<(String, String), Value>,
    metrics: CacheMetrics,
}

impl MemoryCache {
    /// Cache whose entries never expire
    pub fn new() -> Self {
        Self::bounded(DEFAULT_MAX_ENTRIES, None)
    }

    /// Cache whose entries expire `ttl` after being stored
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::bounded(DEFAULT_MAX_ENTRIES, Some(ttl))
    }

    /// Cache holding at most `max_entries` entries
    pub fn bounded(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::<(String, String), Value>::builder()
            .max_capacity(max_entries)
            .support_invalidation_closures();
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Number of live entries, after pending evictions have been applied
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCache for MemoryCache {
    fn get(&self, group: &str, key: &str) -> Option<Value> {
        let value = self.entries.get(&(group.to_string(), key.to_string()));
        if value.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        value
    }

    fn set(&self, group: &str, key: &str, value: Value) {
        self.entries.insert((group.to_string(), key.to_string()), value);
    }

    fn delete(&self, group: &str, key: &str) {
        self.entries.invalidate(&(group.to_string(), key.to_string()));
    }

    fn flush_group(&self, group: &str) {
        let group = group.to_string();
        if let Err(e) = self
            .entries
            .invalidate_entries_if(move |(g, _), _| *g == group)
        {
            warn!("Flushing the whole cache: {}", e);
            self.entries.invalidate_all();
        }
    }
}

/// Hit/miss counters for a [`MemoryCache`].
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> CacheReport {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheReport {
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub hits: usize,
    pub misses: usize,
    /// Percentage (0-100)
    pub hit_rate: f64,
}
