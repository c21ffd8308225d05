//! Cached wrapper around a document-extraction processor.
//!
//! [`CachedProcessor`] programs only against the [`Cache`] contract, so any
//! backend can sit behind it without changing caller code. The cache is a
//! pure accelerant here: a slow or failing cache degrades to recomputation
//! and never aborts the extraction itself.

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{Cache, CacheStats, Fingerprint};
use crate::error::Error;

/// A document-extraction pipeline, viewed from the cache boundary.
///
/// The cache never re-reads or interprets the document; it receives raw
/// bytes, the instruction text, and the expected output shape, and hands
/// back whatever opaque value the pipeline produced.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Run the extraction against the remote provider.
    async fn process(&self, document: &[u8], prompt: &str, schema: &Value) -> Result<Value, Error>;

    /// Provider identity, included in the fingerprint.
    fn provider(&self) -> &str;

    /// Model identity, if the provider distinguishes models.
    fn model(&self) -> Option<&str> {
        None
    }
}

/// Wraps a [`Processor`] with fingerprint-keyed result caching.
pub struct CachedProcessor<P> {
    processor: P,
    cache: Box<dyn Cache>,
}

impl<P: Processor> CachedProcessor<P> {
    pub fn new(processor: P, cache: Box<dyn Cache>) -> Self {
        Self { processor, cache }
    }

    /// Extract, consulting the cache first.
    ///
    /// On a hit the provider is never invoked. On a miss the result is
    /// stored with the cache's default TTL before being returned.
    pub async fn process(&self, document: &[u8], prompt: &str, schema: &Value) -> Result<Value, Error> {
        let key = Fingerprint::derive(document, prompt, schema, self.processor.provider(), self.processor.model());

        if let Some(value) = self.cache.get(&key).await {
            tracing::debug!(provider = self.processor.provider(), "cache hit");
            return Ok(value);
        }

        tracing::debug!(provider = self.processor.provider(), "cache miss; invoking provider");
        let value = self.processor.process(document, prompt, schema).await?;
        self.cache.set(&key, value.clone(), None).await;
        Ok(value)
    }

    /// Statistics from the underlying cache.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::cache::MemoryCache;

    struct CountingProcessor {
        calls: AtomicUsize,
    }

    impl CountingProcessor {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Processor for CountingProcessor {
        async fn process(&self, _document: &[u8], _prompt: &str, _schema: &Value) -> Result<Value, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(json!({"invoice_number": "INV-001"}))
        }

        fn provider(&self) -> &str {
            "gemini"
        }
    }

    #[tokio::test]
    async fn test_hit_suppresses_provider_call() {
        let cached = CachedProcessor::new(CountingProcessor::new(), Box::new(MemoryCache::new(16, None)));

        let schema = json!({"invoice_number": "string"});
        let first = cached.process(b"doc", "Extract", &schema).await.unwrap();
        let second = cached.process(b"doc", "Extract", &schema).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.processor.calls(), 1);

        let stats = cached.cache_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_different_inputs_recompute() {
        let cached = CachedProcessor::new(CountingProcessor::new(), Box::new(MemoryCache::new(16, None)));
        let schema = json!({});

        cached.process(b"doc", "Extract A", &schema).await.unwrap();
        cached.process(b"doc", "Extract B", &schema).await.unwrap();
        cached.process(b"other doc", "Extract A", &schema).await.unwrap();

        assert_eq!(cached.processor.calls(), 3);
    }

    struct FailingProcessor;

    #[async_trait]
    impl Processor for FailingProcessor {
        async fn process(&self, _document: &[u8], _prompt: &str, _schema: &Value) -> Result<Value, Error> {
            Err(Error::ExtractFailed("provider unavailable".into()))
        }

        fn provider(&self) -> &str {
            "gemini"
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_cached() {
        let cached = CachedProcessor::new(FailingProcessor, Box::new(MemoryCache::new(16, None)));

        let result = cached.process(b"doc", "Extract", &json!({})).await;
        assert!(matches!(result, Err(Error::ExtractFailed(_))));
        assert_eq!(cached.cache_stats().await.size, 0);
    }
}
