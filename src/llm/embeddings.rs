use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::database::vector_db::magnitude;

/// Chunks per embedding request when indexing a document.
pub const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Anything that can turn text into fixed-width vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or(EmbeddingError::CountMismatch { expected: 1, actual: 0 })
    }

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Embeds `texts` in batches of `batch_size`. Fails as a whole if any batch fails.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let batch_size = batch_size.max(1);
    let batches = (texts.len() + batch_size - 1) / batch_size;
    let mut embeddings = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        log::info!("Embedding batch {}/{} ({} chunks)", i + 1, batches, batch.len());
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        for vector in &vectors {
            if vector.len() != embedder.dimensions() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: embedder.dimensions(),
                    actual: vector.len(),
                });
            }
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what",
    "when", "where", "which", "who", "why", "with",
];

/// Offline embedder: signed feature hashing of word unigrams and bigrams,
/// L2-normalised. Deterministic for a given input and dimension.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
    model: String,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            model: "local-hashed-bow".to_string(),
        }
    }

    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = magnitude(&vector);
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();
        let index = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::vector_db::cosine_similarity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn batch_embedding_preserves_order_and_determinism() {
        let embedder = LocalEmbedder::new(384);
        let a = "The lighthouse keeper owns a grey cat named Biscuit.";
        let b = "Tides rise twice a day along the northern coast.";

        let pair = embedder.embed_batch(&[a, b]).await.unwrap();
        let single = embedder.embed_batch(&[a]).await.unwrap();
        assert_eq!(pair[0], single[0]);
        assert_eq!(pair[1], embedder.embed(b).await.unwrap());
        assert_eq!(pair[0].len(), 384);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = LocalEmbedder::new(64);
        let v = embedder.embed_text("Rust ownership and borrowing rules");
        assert!((magnitude(&v) - 1.0).abs() < 1e-5);
        assert!(embedder.embed_text("   ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn related_text_scores_higher() {
        let embedder = LocalEmbedder::new(384);
        let query = embedder.embed_text("What is the name of the keeper's cat?");
        let related = embedder.embed_text("The keeper's cat is named Biscuit.");
        let unrelated = embedder.embed_text("Quarterly revenue grew by four percent.");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn tokenizer_drops_stopwords_and_punctuation() {
        assert_eq!(
            tokenize("What is the Capital of France?"),
            vec!["capital".to_string(), "france".to_string()]
        );
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
        dims: usize,
        returned_dims: usize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.5; self.returned_dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn embeds_in_batches() {
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0), dims: 2, returned_dims: 2 };
        let texts: Vec<String> = (0..130).map(|i| format!("chunk {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let vectors = embed_in_batches(&embedder, &refs, EMBED_BATCH_SIZE).await.unwrap();
        assert_eq!(vectors.len(), 130);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejects_wrong_width_vectors() {
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0), dims: 4, returned_dims: 3 };
        let err = embed_in_batches(&embedder, &["a", "b"], 8).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 4, actual: 3 }));
    }
}
