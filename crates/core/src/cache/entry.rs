//! The stored cache record: value plus expiry bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cached extraction result.
///
/// This is the persisted format of the file-per-entry store and the logical
/// row shape of the SQLite store. The value is opaque to the cache; typed
/// (de)serialization happens at the collaborator boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    /// `None` never expires. `Some(0.0)` expires immediately; zero is not
    /// overloaded as "no TTL".
    pub ttl_seconds: Option<f64>,
}

impl CacheEntry {
    /// Create an entry timestamped now.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self { value, created_at: Utc::now(), ttl_seconds: ttl.map(|t| t.as_secs_f64()) }
    }

    /// Whether the entry has outlived its TTL as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_seconds {
            Some(ttl) => {
                let age = (now - self.created_at).num_milliseconds() as f64 / 1000.0;
                age > ttl
            }
            None => false,
        }
    }
}
