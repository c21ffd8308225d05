//! Bounded in-process cache with LRU eviction and TTL expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::fingerprint::Fingerprint;
use super::{Cache, CacheStats};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    created_at: Instant,
    ttl: Option<Duration>,
    /// Recency tick; higher means more recently used.
    last_access: u64,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| now.duration_since(self.created_at) > ttl)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Fingerprint, MemoryEntry>,
    /// Monotonic access counter. Strictly increasing, so recency never ties
    /// and eviction order falls back to insertion order by construction.
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// Process-lifetime cache bounded by entry count.
///
/// Fastest path of the three backends; nothing survives a restart. All
/// operations share one mutex and the lock is never held across an await
/// point.
pub struct MemoryCache {
    max_size: usize,
    default_ttl: Option<Duration>,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create a cache holding at most `max_size` entries.
    ///
    /// `default_ttl` applies to every `set` that does not override it;
    /// `None` means entries never expire.
    pub fn new(max_size: usize, default_ttl: Option<Duration>) -> Self {
        Self { max_size: max_size.max(1), default_ttl, inner: Mutex::new(Inner::default()) }
    }

    /// A poisoned lock only means another thread panicked mid-operation;
    /// the map itself is still usable, so recover rather than propagate.
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &Fingerprint) -> Option<Value> {
        let now = Instant::now();
        let mut inner = self.locked();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        let value = match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = tick;
                entry.value.clone()
            }
            None => {
                inner.misses += 1;
                return None;
            }
        };
        inner.hits += 1;
        Some(value)
    }

    async fn set(&self, key: &Fingerprint, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.or(self.default_ttl);
        let mut inner = self.locked();
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key.clone(),
            MemoryEntry { value, created_at: Instant::now(), ttl, last_access: tick },
        );
        // The new entry carries the highest tick, so it is never the victim.
        while inner.entries.len() > self.max_size {
            inner.evict_lru();
        }
    }

    async fn delete(&self, key: &Fingerprint) -> bool {
        self.locked().entries.remove(key).is_some()
    }

    async fn clear(&self) -> u64 {
        let mut inner = self.locked();
        let removed = inner.entries.len() as u64;
        inner.entries.clear();
        inner.tick = 0;
        removed
    }

    async fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut inner = self.locked();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        (before - inner.entries.len()) as u64
    }

    async fn stats(&self) -> CacheStats {
        let inner = self.locked();
        CacheStats {
            size: inner.entries.len() as u64,
            max_size: Some(self.max_size as u64),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
