//! Core caching subsystem for strux.
//!
//! This crate provides:
//! - Deterministic fingerprint derivation for extraction requests
//! - Three interchangeable cache backends (memory, file, SQLite)
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod processor;

pub use cache::{Cache, CacheEntry, CacheStats, FileCache, Fingerprint, MemoryCache, SqliteCache};
pub use config::{BackendKind, CacheConfig};
pub use error::Error;
pub use processor::{CachedProcessor, Processor};
