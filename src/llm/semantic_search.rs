use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::vector_db::{ScoredRecord, VectorDB};
use crate::error::RagError;
use crate::llm::embeddings::Embedder;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    /// Distance to the query under the index metric; smaller is closer.
    pub distance: f32,
    pub source: String,
    pub chunk_index: usize,
    pub document_id: Uuid,
}

impl From<ScoredRecord> for SearchResult {
    fn from(scored: ScoredRecord) -> Self {
        Self {
            text: scored.record.text,
            distance: scored.distance,
            source: scored.record.source,
            chunk_index: scored.record.chunk_index,
            document_id: scored.record.document_id,
        }
    }
}

/// Top-k retrieval: embed the question, then scan the index.
#[derive(Clone)]
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn search(&self, vector_db: &VectorDB, query: &str) -> Result<Vec<SearchResult>, RagError> {
        if vector_db.is_empty() {
            return Err(RagError::IndexEmpty);
        }
        let query_embedding = self.embed_query(query).await?;
        self.retrieve(vector_db, &query_embedding)
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embedder.embed(query).await?)
    }

    pub fn retrieve(&self, vector_db: &VectorDB, query_embedding: &[f32]) -> Result<Vec<SearchResult>, RagError> {
        let results = vector_db.query(query_embedding, self.top_k)?;

        log::debug!(
            "Retrieved {} chunks (closest distance {:?})",
            results.len(),
            results.first().map(|r| r.distance)
        );
        Ok(results.into_iter().map(SearchResult::from).collect())
    }
}
