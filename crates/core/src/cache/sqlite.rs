//! Embedded relational cache backed by SQLite.
//!
//! One `entries` table, one row per fingerprint. Eviction is LRU-style by
//! `last_access` once the row count exceeds the configured ceiling.
//! Multiple instances opened against the same path observe each other's
//! writes; SQLite's transactional locking serializes them, so readers never
//! see a partially written row.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::entry::CacheEntry;
use super::fingerprint::Fingerprint;
use super::{Cache, CacheStats};
use crate::error::Error;

/// Durable, bounded cache persisted in a single SQLite store file.
pub struct SqliteCache {
    db: CacheDb,
    max_size: usize,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Timestamp format stored in `created_at` / `last_access`. Fixed-width so
/// lexicographic ordering agrees with chronological ordering, and parseable
/// by SQLite's date functions for the expiry sweep.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteCache {
    /// Open (creating if absent) the store file and ensure the schema
    /// exists. Initialization is eager: an unusable store fails here rather
    /// than on first use.
    pub async fn open(
        path: impl AsRef<Path>,
        max_size: usize,
        default_ttl: Option<Duration>,
    ) -> Result<Self, Error> {
        Ok(Self::with_db(CacheDb::open(path).await?, max_size, default_ttl))
    }

    /// In-memory store with the same schema, for testing.
    pub async fn open_in_memory(max_size: usize, default_ttl: Option<Duration>) -> Result<Self, Error> {
        Ok(Self::with_db(CacheDb::open_in_memory().await?, max_size, default_ttl))
    }

    fn with_db(db: CacheDb, max_size: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            db,
            max_size: max_size.max(1),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    async fn lookup(&self, key: String) -> Result<Option<(String, String, Option<f64>)>, Error> {
        self.db
            .conn
            .call(move |conn| -> Result<Option<(String, String, Option<f64>)>, Error> {
                let mut stmt = conn.prepare("SELECT value, created_at, ttl FROM entries WHERE key = ?1")?;
                let result = stmt.query_row(params![key], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                });
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn touch(&self, key: String) -> Result<(), Error> {
        let now = now_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("UPDATE entries SET last_access = ?2 WHERE key = ?1", params![key, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: String) -> Result<bool, Error> {
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Upsert a row, then evict oldest-`last_access` rows while the count
    /// exceeds the ceiling. Returns the number of evicted rows.
    async fn upsert(&self, key: String, value_json: String, ttl: Option<f64>) -> Result<u64, Error> {
        let now = now_rfc3339();
        let max = self.max_size as i64;
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                conn.execute(
                    "INSERT INTO entries (key, value, created_at, ttl, last_access)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         created_at = excluded.created_at,
                         ttl = excluded.ttl,
                         last_access = excluded.last_access",
                    params![key, value_json, now, ttl, now],
                )?;

                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE key IN (
                        SELECT key FROM entries ORDER BY last_access ASC, created_at ASC LIMIT ?1
                    )",
                    params![count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    fn decode(value_json: &str, created_at: &str, ttl_seconds: Option<f64>) -> Option<CacheEntry> {
        let value = serde_json::from_str(value_json).ok()?;
        let created_at = DateTime::parse_from_rfc3339(created_at).ok()?.with_timezone(&Utc);
        Some(CacheEntry { value, created_at, ttl_seconds })
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get(&self, key: &Fingerprint) -> Option<Value> {
        let key_str = key.to_string();
        let row = match self.lookup(key_str.clone()).await {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(error = %err, "cache lookup failed; treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let Some((value_json, created_at, ttl)) = row else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match Self::decode(&value_json, &created_at, ttl) {
            Some(entry) if !entry.is_expired(Utc::now()) => {
                if let Err(err) = self.touch(key_str).await {
                    tracing::warn!(error = %err, "failed to update last_access");
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            // Expired or undecodable rows are dropped and read as misses.
            other => {
                if other.is_none() {
                    tracing::warn!(key = %key_str, "removing undecodable cache row");
                }
                if let Err(err) = self.remove(key_str).await {
                    tracing::warn!(error = %err, "failed to remove stale cache row");
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &Fingerprint, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.or(self.default_ttl).map(|t| t.as_secs_f64());
        match self.upsert(key.to_string(), value.to_string(), ttl).await {
            Ok(evicted) => {
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
            }
            Err(err) => tracing::warn!(error = %err, "cache write failed; entry not stored"),
        }
    }

    async fn delete(&self, key: &Fingerprint) -> bool {
        match self.remove(key.to_string()).await {
            Ok(existed) => existed,
            Err(err) => {
                tracing::warn!(error = %err, "cache delete failed");
                false
            }
        }
    }

    async fn clear(&self) -> u64 {
        let result = self
            .db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM entries", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from);
        match result {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(error = %err, "cache clear failed");
                0
            }
        }
    }

    async fn cleanup_expired(&self) -> u64 {
        let now = now_rfc3339();
        let result = self
            .db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE ttl IS NOT NULL
                     AND (julianday(?1) - julianday(created_at)) * 86400.0 > ttl",
                    params![now],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from);
        match result {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(error = %err, "expired-entry sweep failed");
                0
            }
        }
    }

    async fn stats(&self) -> CacheStats {
        let size = self
            .db
            .conn
            .call(|conn| -> Result<i64, Error> {
                Ok(conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?)
            })
            .await
            .map_err(Error::from)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "cache row count failed");
                0
            });
        CacheStats {
            size: size as u64,
            max_size: Some(self.max_size as u64),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
