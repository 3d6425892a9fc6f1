use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::embeddings::{Embedder, EmbeddingError};

/// LRU cache in front of another embedder. Only misses reach the inner embedder.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = {
            let mut cache = self.cache.lock();
            texts.iter().map(|t| cache.get(*t).cloned()).collect()
        };

        let misses: Vec<&str> = texts
            .iter()
            .zip(&results)
            .filter(|(_, hit)| hit.is_none())
            .map(|(t, _)| *t)
            .collect();

        if !misses.is_empty() {
            let fresh = self.inner.embed_batch(&misses).await?;
            if fresh.len() != misses.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: misses.len(),
                    actual: fresh.len(),
                });
            }

            let mut cache = self.cache.lock();
            let mut fresh = fresh.into_iter();
            for (text, slot) in texts.iter().zip(results.iter_mut()) {
                if slot.is_none() {
                    if let Some(vector) = fresh.next() {
                        cache.put(text.to_string(), vector.clone());
                        *slot = Some(vector);
                    }
                }
            }
        }

        log::debug!("Embedding cache: {} of {} texts were hits", texts.len() - misses.len(), texts.len());
        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
