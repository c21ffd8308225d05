//! File-per-entry cache: one JSON file per fingerprint, restart durable.
//!
//! Entries are human-inspectable JSON records. Writes go to a temporary
//! sibling and are renamed into place, so concurrent readers never observe
//! a half-written entry and a failed write never corrupts an existing one.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::entry::CacheEntry;
use super::fingerprint::Fingerprint;
use super::{Cache, CacheStats};
use crate::error::Error;

/// Durable cache storing each entry as one JSON file in a directory.
pub struct FileCache {
    dir: PathBuf,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FileCache {
    /// Open a cache directory, creating it if absent.
    ///
    /// An unusable directory fails here and never resurfaces on later
    /// operations, which degrade to misses instead.
    pub fn new(dir: impl Into<PathBuf>, default_ttl: Option<Duration>) -> Result<Self, Error> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, default_ttl, hits: AtomicU64::new(0), misses: AtomicU64::new(0) })
    }

    /// Directory this cache writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem-safe, length-bounded file name: a secondary hash of the
    /// fingerprint's canonical string.
    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.to_string().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    async fn write_entry(&self, path: &Path, entry: &CacheEntry) -> Result<(), Error> {
        let json = serde_json::to_vec(entry)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("json"))
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &Fingerprint) -> Option<Value> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            // Absent or unreadable both read as a miss.
            Err(_) => {
                self.record_miss();
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if !entry.is_expired(Utc::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            Ok(_) => {
                let _ = tokio::fs::remove_file(&path).await;
                self.record_miss();
                None
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "removing unparseable cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                self.record_miss();
                None
            }
        }
    }

    async fn set(&self, key: &Fingerprint, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl.or(self.default_ttl));
        let path = self.entry_path(key);
        if let Err(err) = self.write_entry(&path, &entry).await {
            tracing::warn!(path = %path.display(), error = %err, "cache write failed; entry not stored");
        }
    }

    async fn delete(&self, key: &Fingerprint) -> bool {
        tokio::fs::remove_file(self.entry_path(key)).await.is_ok()
    }

    async fn clear(&self) -> u64 {
        let mut removed = 0;
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(dirent)) = entries.next_entry().await {
            let path = dirent.path();
            if is_entry_file(&path) && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    async fn cleanup_expired(&self) -> u64 {
        let now = Utc::now();
        let mut removed = 0;
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(dirent)) = entries.next_entry().await {
            let path = dirent.path();
            if !is_entry_file(&path) {
                continue;
            }
            let expired = match tokio::fs::read(&path).await {
                // Unparseable entries count as already expired.
                Ok(bytes) => serde_json::from_slice::<CacheEntry>(&bytes)
                    .map(|entry| entry.is_expired(now))
                    .unwrap_or(true),
                Err(_) => false,
            };
            if expired && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    async fn stats(&self) -> CacheStats {
        let mut size = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await {
            while let Ok(Some(dirent)) = entries.next_entry().await {
                if is_entry_file(&dirent.path()) {
                    size += 1;
                }
            }
        }
        CacheStats {
            size,
            max_size: None,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: 0,
        }
    }
}
