//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STRUX_*)
//! 2. TOML config file (if STRUX_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, FileCache, MemoryCache, SqliteCache};
use crate::error::Error;

mod validation;

pub use validation::ConfigError;

/// Which storage backend [`CacheConfig::build`] constructs.
///
/// A closed set on purpose: backend selection is a tagged variant mapped
/// from a configuration string, not open-ended registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
    Sqlite,
}

/// Cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STRUX_*)
/// 2. TOML config file (if STRUX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Storage backend to construct.
    ///
    /// Set via STRUX_BACKEND environment variable (memory, file, sqlite).
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Entry-count ceiling for the bounded backends (memory, sqlite).
    ///
    /// Set via STRUX_MAX_SIZE environment variable.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Default TTL in seconds; unset means entries never expire.
    ///
    /// Set via STRUX_TTL_SECONDS environment variable.
    #[serde(default)]
    pub ttl_seconds: Option<f64>,

    /// Directory for the file backend.
    ///
    /// Set via STRUX_DIR environment variable.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Store file for the sqlite backend.
    ///
    /// Set via STRUX_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_backend() -> BackendKind {
    BackendKind::Memory
}

fn default_max_size() -> usize {
    1024
}

fn default_dir() -> PathBuf {
    PathBuf::from("./strux-cache")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./strux-cache.sqlite")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_size: default_max_size(),
            ttl_seconds: None,
            dir: default_dir(),
            db_path: default_db_path(),
        }
    }
}

impl CacheConfig {
    /// Default TTL as a Duration, ignoring unusable values.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.ttl_seconds
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STRUX_`
    /// 2. TOML file from `STRUX_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation fails
    /// after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STRUX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STRUX_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Construct the configured backend behind the shared contract.
    ///
    /// Construction of a durable backend is the one place a cache failure
    /// is fatal: the caller chose persistence and must know if it is
    /// unavailable.
    pub async fn build(&self) -> Result<Box<dyn Cache>, Error> {
        let ttl = self.default_ttl();
        match self.backend {
            BackendKind::Memory => Ok(Box::new(MemoryCache::new(self.max_size, ttl))),
            BackendKind::File => Ok(Box::new(FileCache::new(&self.dir, ttl)?)),
            BackendKind::Sqlite => Ok(Box::new(SqliteCache::open(&self.db_path, self.max_size, ttl).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.max_size, 1024);
        assert!(config.ttl_seconds.is_none());
        assert_eq!(config.dir, PathBuf::from("./strux-cache"));
        assert_eq!(config.db_path, PathBuf::from("./strux-cache.sqlite"));
    }

    #[test]
    fn test_default_ttl_conversion() {
        let config = CacheConfig { ttl_seconds: Some(1.5), ..Default::default() };
        assert_eq!(config.default_ttl(), Some(Duration::from_millis(1500)));

        let config = CacheConfig { ttl_seconds: None, ..Default::default() };
        assert_eq!(config.default_ttl(), None);

        let config = CacheConfig { ttl_seconds: Some(-1.0), ..Default::default() };
        assert_eq!(config.default_ttl(), None);
    }

    #[test]
    fn test_backend_kind_parses_lowercase() {
        assert_eq!(serde_json::from_str::<BackendKind>(r#""memory""#).unwrap(), BackendKind::Memory);
        assert_eq!(serde_json::from_str::<BackendKind>(r#""file""#).unwrap(), BackendKind::File);
        assert_eq!(serde_json::from_str::<BackendKind>(r#""sqlite""#).unwrap(), BackendKind::Sqlite);
        assert!(serde_json::from_str::<BackendKind>(r#""redis""#).is_err());
    }

    #[tokio::test]
    async fn test_build_memory_backend() {
        let config = CacheConfig::default();
        let cache = config.build().await.unwrap();
        assert_eq!(cache.stats().await.max_size, Some(1024));
    }

    #[tokio::test]
    async fn test_build_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: BackendKind::File,
            dir: dir.path().join("cache"),
            ..Default::default()
        };
        let cache = config.build().await.unwrap();
        assert_eq!(cache.stats().await.size, 0);
        assert!(dir.path().join("cache").is_dir());
    }

    #[tokio::test]
    async fn test_build_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: BackendKind::Sqlite,
            db_path: dir.path().join("cache.sqlite"),
            ..Default::default()
        };
        let cache = config.build().await.unwrap();
        assert_eq!(cache.stats().await.size, 0);
        assert!(dir.path().join("cache.sqlite").exists());
    }

    #[tokio::test]
    async fn test_build_sqlite_unusable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: BackendKind::Sqlite,
            // A directory cannot be opened as a store file.
            db_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.build().await.is_err());
    }
}
