//! Configuration validation rules.
//!
//! Validation logic for `CacheConfig` values after they have been loaded
//! from environment, files, or defaults.

use thiserror::Error;

use crate::config::CacheConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_size` is 0
    /// - `ttl_seconds` is negative or not a finite number
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_size".into(),
                reason: "must be at least 1".into(),
            });
        }

        if let Some(ttl) = self.ttl_seconds {
            if !ttl.is_finite() {
                return Err(ConfigError::Invalid {
                    field: "ttl_seconds".into(),
                    reason: "must be a finite number".into(),
                });
            }
            if ttl < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "ttl_seconds".into(),
                    reason: "must not be negative".into(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_max_size() {
        let config = CacheConfig { max_size: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_size"));
    }

    #[test]
    fn test_validate_negative_ttl() {
        let config = CacheConfig { ttl_seconds: Some(-0.5), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ttl_seconds"));
    }

    #[test]
    fn test_validate_non_finite_ttl() {
        let config = CacheConfig { ttl_seconds: Some(f64::NAN), ..Default::default() };
        assert!(config.validate().is_err());

        let config = CacheConfig { ttl_seconds: Some(f64::INFINITY), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_edge_values() {
        // Zero TTL is legitimate: it means "expire immediately", not "no TTL".
        let config = CacheConfig { max_size: 1, ttl_seconds: Some(0.0), ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
