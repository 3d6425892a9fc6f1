use thiserror::Error;

use crate::database::vector_db::VectorDBError;
use crate::llm::embeddings::EmbeddingError;
use crate::providers::traits::GenerationError;

/// Every failure a single upload or question can end in.
///
/// None of these is fatal to the process; the UI reports the message and
/// accepts the next request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    #[error("Document '{filename}' is empty or unreadable: {reason}")]
    EmptyDocument { filename: String, reason: String },

    #[error("Unsupported file type for '{0}'. Please upload a PDF or TXT file.")]
    UnsupportedFormat(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("No documents have been indexed yet. Upload a file first.")]
    IndexEmpty,

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Authentication with the language model provider failed: {0}")]
    GenerationAuthFailure(String),

    #[error("The language model provider is rate limiting requests (gave up after {attempts} attempts)")]
    GenerationRateLimited { attempts: u32 },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl RagError {
    pub fn empty_document(filename: &str, reason: impl Into<String>) -> Self {
        RagError::EmptyDocument {
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingUnavailable(_) | RagError::GenerationRateLimited { .. }
        )
    }

    /// Stable identifier used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::EmptyDocument { .. } => "empty_document",
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::IndexEmpty => "index_empty",
            RagError::Index(_) => "index_error",
            RagError::GenerationAuthFailure(_) => "generation_auth_failure",
            RagError::GenerationRateLimited { .. } => "generation_rate_limited",
            RagError::GenerationFailed(_) => "generation_failed",
        }
    }
}

impl From<EmbeddingError> for RagError {
    fn from(e: EmbeddingError) -> Self {
        RagError::EmbeddingUnavailable(e.to_string())
    }
}

impl From<VectorDBError> for RagError {
    fn from(e: VectorDBError) -> Self {
        match e {
            VectorDBError::Empty => RagError::IndexEmpty,
            other => RagError::Index(other.to_string()),
        }
    }
}

impl From<GenerationError> for RagError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Auth(msg) => RagError::GenerationAuthFailure(msg),
            GenerationError::RateLimited { attempts } => RagError::GenerationRateLimited { attempts },
            other => RagError::GenerationFailed(other.to_string()),
        }
    }
}
