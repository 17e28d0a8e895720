// ABOUTME: Time-bounded memoization with least-recently-used eviction.
// ABOUTME: Shared between analysis workers, so every operation takes one short internal lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
    last_access: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Monotonic access counter; lower means less recently used.
    tick: u64,
    hits: u64,
    misses: u64,
}

/// Point-in-time counters for a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: Option<usize>,
    pub ttl: Duration,
    pub hits: u64,
    pub misses: u64,
}

/// A map whose entries expire `ttl` after insertion.
///
/// When `max_size` is set and a new key would exceed it, the least recently
/// read or written entry is evicted first. Expired entries are dropped lazily
/// on read, or eagerly through [`TtlCache::cleanup_expired`].
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_size: Option<usize>,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_size: Option<usize>) -> Self {
        Self {
            ttl,
            max_size,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Return a clone of the cached value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => now >= entry.expires_at,
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        inner.hits += 1;
        inner.entries.get_mut(key).map(|entry| {
            entry.last_access = tick;
            entry.value.clone()
        })
    }

    /// Insert or replace a value, evicting the least recently used entry if full.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(max) = self.max_size
            && !inner.entries.contains_key(&key)
            && inner.entries.len() >= max
        {
            // Prefer dropping something already expired over a live entry.
            inner.entries.retain(|_, e| now < e.expires_at);
            if inner.entries.len() >= max {
                let lru = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone());
                if let Some(lru) = lru {
                    inner.entries.remove(&lru);
                }
            }
        }

        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                last_access: tick,
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of stored entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry and return how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| now < e.expires_at);
        before - inner.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            ttl: self.ttl,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
