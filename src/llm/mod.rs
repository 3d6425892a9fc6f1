pub mod cache;
pub mod chat;
pub mod embeddings;
pub mod prompt;
pub mod semantic_search;

pub use cache::CachedEmbedder;
pub use chat::{Answer, ChatMessage, ChatSession, IngestReport, RequestState, SessionConfig, SessionInfo};
pub use embeddings::{Embedder, EmbeddingError, LocalEmbedder};
pub use prompt::{AssembledPrompt, PromptAssembler};
pub use semantic_search::{SearchResult, SemanticSearch};
