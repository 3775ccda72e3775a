//! Embedding cache
//!
//! Bounded LRU keyed by the SHA-256 of the input text. Identical queries
//! (the common case behind the global answer cache misses) skip the
//! embedding service entirely.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use climate_chat_core::{Embedding, EmbeddingProvider, Result};

/// Hit/miss counters for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// LRU-caching wrapper around any embedding provider.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Embedding>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> EmbeddingCacheStats {
        EmbeddingCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("{digest:x}")
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let key = Self::key(text);

        if let Some(hit) = self.cache.lock().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let embedding = self.inner.embed(text).await?;
        self.cache.lock().put(key, embedding.clone());
        Ok(embedding)
    }

    async fn prewarm(&self) -> Result<()> {
        self.inner.prewarm().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use climate_chat_core::SparseVector;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Embedding {
                dense: vec![text.len() as f32],
                sparse: SparseVector::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), 8);

        cached.embed("heat waves in cities").await.unwrap();
        cached.embed("heat waves in cities").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), 1);

        cached.embed("first").await.unwrap();
        cached.embed("second").await.unwrap();
        cached.embed("first").await.unwrap();

        // "first" was evicted by "second", so three real calls.
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }
}
