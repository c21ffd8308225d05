//! Content-addressed result cache for document extraction.
//!
//! Avoids repeating expensive, non-deterministic provider calls when the
//! same inputs recur. Three backends implement one contract:
//!
//! - [`MemoryCache`] — in-process, LRU-bounded, TTL-aware
//! - [`FileCache`] — one JSON file per fingerprint, restart durable
//! - [`SqliteCache`] — single store file, WAL mode for concurrent access
//!
//! The cache never interprets the values it stores and never blocks the
//! primary computation path: in-flight storage failures read as misses.

pub mod connection;
pub mod entry;
pub mod file;
pub mod fingerprint;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use connection::CacheDb;
pub use entry::CacheEntry;
pub use file::FileCache;
pub use fingerprint::Fingerprint;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Point-in-time statistics for one cache backend instance.
///
/// Hit/miss counters cover the instance's lifetime only; they are not
/// persisted across restarts.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently stored (expired-but-unswept entries count).
    pub size: u64,
    /// Entry-count ceiling, for bounded backends.
    pub max_size: Option<u64>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache; zero before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Storage contract shared by all cache backends.
///
/// Callers program only against this trait, so backends are interchangeable.
/// Operations are infallible by design: expired or corrupt entries and
/// storage errors all read as misses, because the caller can always
/// recompute the value. Only construction of a durable backend can fail.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a cached value.
    async fn get(&self, key: &Fingerprint) -> Option<Value>;

    /// Insert or overwrite a value. A `ttl` of `None` applies the backend's
    /// default TTL.
    async fn set(&self, key: &Fingerprint, value: Value, ttl: Option<Duration>);

    /// Remove an entry, reporting whether it was present.
    async fn delete(&self, key: &Fingerprint) -> bool;

    /// Remove every entry, returning the number removed. Hit/miss counters
    /// are not reset.
    async fn clear(&self) -> u64;

    /// Remove every expired entry, returning the number removed.
    async fn cleanup_expired(&self) -> u64;

    /// Current size and lookup counters.
    async fn stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(tag: &str) -> Fingerprint {
        Fingerprint::derive(tag.as_bytes(), "p", &json!({}), "g", None)
    }

    /// The shared contract every backend must satisfy, driven through the
    /// trait object exactly as the extraction pipeline sees it.
    async fn exercise_contract(cache: &dyn Cache) {
        let k = key("abc123:def456:ghi789:gemini");
        assert_eq!(cache.get(&k).await, None);

        cache.set(&k, json!({"invoice_number": "INV-001"}), None).await;
        assert_eq!(cache.get(&k).await, Some(json!({"invoice_number": "INV-001"})));

        // Overwrite wins.
        cache.set(&k, json!({"invoice_number": "INV-002"}), None).await;
        assert_eq!(cache.get(&k).await, Some(json!({"invoice_number": "INV-002"})));

        assert!(cache.delete(&k).await);
        assert!(!cache.delete(&k).await);
        assert_eq!(cache.get(&k).await, None);

        // Idempotent clear on an empty store.
        assert_eq!(cache.clear().await, 0);

        cache.set(&key("one"), json!(1), None).await;
        cache.set(&key("two"), json!(2), None).await;
        assert_eq!(cache.stats().await.size, 2);
        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.get(&key("one")).await, None);

        // Nothing carries a TTL here, so there is nothing to sweep.
        assert_eq!(cache.cleanup_expired().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.size, 0);
        assert!(stats.hits >= 2);
        assert!(stats.misses >= 2);
        assert!(stats.hit_rate() > 0.0 && stats.hit_rate() < 1.0);
    }

    async fn exercise_expiry(cache: &dyn Cache) {
        let k = key("expiring");
        cache.set(&k, json!("short-lived"), Some(Duration::from_millis(100))).await;
        assert_eq!(cache.get(&k).await, Some(json!("short-lived")));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get(&k).await, None);
    }

    #[tokio::test]
    async fn test_contract_memory() {
        let cache = MemoryCache::new(16, None);
        exercise_contract(&cache).await;
    }

    #[tokio::test]
    async fn test_contract_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), None).unwrap();
        exercise_contract(&cache).await;
    }

    #[tokio::test]
    async fn test_contract_sqlite() {
        let cache = SqliteCache::open_in_memory(16, None).await.unwrap();
        exercise_contract(&cache).await;
    }

    #[tokio::test]
    async fn test_expiry_memory() {
        let cache = MemoryCache::new(16, None);
        exercise_expiry(&cache).await;
    }

    #[tokio::test]
    async fn test_expiry_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), None).unwrap();
        exercise_expiry(&cache).await;
    }

    #[tokio::test]
    async fn test_expiry_sqlite() {
        let cache = SqliteCache::open_in_memory(16, None).await.unwrap();
        exercise_expiry(&cache).await;
    }

    #[test]
    fn test_hit_rate_zero_before_any_access() {
        let stats = CacheStats { size: 0, max_size: None, hits: 0, misses: 0, evictions: 0 };
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_ratio() {
        let stats = CacheStats { size: 1, max_size: None, hits: 3, misses: 1, evictions: 0 };
        assert_eq!(stats.hit_rate(), 0.75);
    }
}
