use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ConfigError, Settings};
use crate::database::vector_db::{DistanceMetric, VectorDB, VectorRecord};
use crate::document::{
    load_document, split_document, ChunkConfig, ChunkInfo, DocumentInfo, DocumentSummary, Upload,
};
use crate::error::RagError;
use crate::llm::embeddings::{embed_in_batches, Embedder, EMBED_BATCH_SIZE};
use crate::llm::prompt::PromptAssembler;
use crate::llm::semantic_search::{SearchResult, SemanticSearch};
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::preview;

const SOURCE_PREVIEW_CHARS: usize = 200;

/// Where the current (or last) upload or question is in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Loading,
    Chunking,
    Embedding,
    Indexing,
    Retrieving,
    Assembling,
    Generating,
    Done,
    Failed(String),
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(&format!("{:?}", other).to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One retrieved chunk as shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub source: String,
    pub chunk_index: usize,
    pub distance: f32,
    pub preview: String,
}

impl From<&SearchResult> for Source {
    fn from(result: &SearchResult) -> Self {
        Self {
            source: result.source.clone(),
            chunk_index: result.chunk_index,
            distance: result.distance,
            preview: preview(&result.text, SOURCE_PREVIEW_CHARS),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Chunks that were placed in the prompt, best match first.
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: DocumentSummary,
    pub indexed_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub documents: DocumentInfo,
    pub chunks: ChunkInfo,
    pub loaded: Vec<DocumentSummary>,
    pub indexed_chunks: usize,
    pub messages: usize,
    pub state: RequestState,
    pub embedding_model: String,
    pub llm_model: String,
}

/// Knobs the session needs from the settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub chunk: ChunkConfig,
    pub retriever_k: usize,
    pub distance_metric: DistanceMetric,
    pub max_prompt_chars: usize,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            chunk: ChunkConfig::new(settings.chunk_size, settings.chunk_overlap)?
                .with_strategy(settings.chunk_strategy),
            retriever_k: settings.retriever_k,
            distance_metric: settings.distance_metric,
            max_prompt_chars: settings.max_prompt_chars,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig {
                chunk_size: 500,
                chunk_overlap: 100,
                strategy: crate::document::ChunkStrategy::Fixed,
            },
            retriever_k: 4,
            distance_metric: DistanceMetric::Cosine,
            max_prompt_chars: 12_000,
        }
    }
}

/// Everything one user works with: the indexed documents, the vector index and
/// the conversation so far. Requests run one at a time through `&mut self`.
pub struct ChatSession {
    id: Uuid,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn CompletionProvider>,
    chunk_config: ChunkConfig,
    retriever: SemanticSearch,
    assembler: PromptAssembler,
    vector_db: VectorDB,
    documents: Vec<DocumentSummary>,
    chunk_sizes: Vec<usize>,
    history: Vec<ChatMessage>,
    state: RequestState,
}

impl ChatSession {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn CompletionProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            retriever: SemanticSearch::new(embedder.clone(), config.retriever_k),
            embedder,
            generator,
            chunk_config: config.chunk,
            assembler: PromptAssembler::new(config.max_prompt_chars),
            vector_db: VectorDB::new(config.distance_metric),
            documents: Vec::new(),
            chunk_sizes: Vec::new(),
            history: Vec::new(),
            state: RequestState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn has_documents(&self) -> bool {
        !self.vector_db.is_empty()
    }

    /// Loads, chunks and embeds one upload, then indexes all of its chunks.
    /// Nothing is indexed unless every step succeeds.
    pub async fn ingest(&mut self, upload: Upload) -> Result<IngestReport, RagError> {
        let result = self.run_ingest(upload).await;
        self.finish(&result);
        result
    }

    async fn run_ingest(&mut self, upload: Upload) -> Result<IngestReport, RagError> {
        self.state = RequestState::Loading;
        let filename = upload.filename.clone();
        let document = tokio::task::spawn_blocking(move || load_document(&upload))
            .await
            .map_err(|e| RagError::empty_document(&filename, format!("loader task failed: {}", e)))??;

        self.state = RequestState::Chunking;
        let chunks = split_document(&document, &self.chunk_config)?;

        self.state = RequestState::Embedding;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embed_in_batches(self.embedder.as_ref(), &texts, EMBED_BATCH_SIZE).await?;

        self.state = RequestState::Indexing;
        for embedding in &embeddings {
            self.vector_db.check_dimensions(embedding)?;
        }
        let sizes: Vec<usize> = chunks.iter().map(|c| c.char_len()).collect();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.vector_db.insert(VectorRecord {
                text: chunk.text,
                embedding,
                document_id: chunk.document_id,
                source: chunk.source,
                chunk_index: chunk.index,
            })?;
        }

        let summary = DocumentSummary {
            id: document.id,
            filename: document.filename.clone(),
            kind: document.kind,
            pages: document.pages,
            characters: document.char_count(),
            chunks: sizes.len(),
        };
        self.chunk_sizes.extend(sizes);
        self.documents.push(summary.clone());

        log::info!(
            "Indexed '{}': {} chunks ({} in session)",
            summary.filename,
            summary.chunks,
            self.vector_db.len()
        );
        Ok(IngestReport {
            document: summary,
            indexed_chunks: self.vector_db.len(),
        })
    }

    /// Answers a question from the indexed documents. History only grows when
    /// an answer was produced.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, RagError> {
        let result = self.run_ask(question).await;
        self.finish(&result);
        if let Ok(answer) = &result {
            self.history.push(ChatMessage::new(Role::User, question.trim()));
            self.history.push(ChatMessage::new(Role::Assistant, answer.text.clone()));
        }
        result
    }

    async fn run_ask(&mut self, question: &str) -> Result<Answer, RagError> {
        if self.vector_db.is_empty() {
            return Err(RagError::IndexEmpty);
        }

        self.state = RequestState::Embedding;
        let query_embedding = self.retriever.embed_query(question).await?;

        self.state = RequestState::Retrieving;
        let results = self.retriever.retrieve(&self.vector_db, &query_embedding)?;

        self.state = RequestState::Assembling;
        let prompt = self.assembler.assemble(question, &results);

        self.state = RequestState::Generating;
        log::info!(
            "Asking {} with {} context chunks",
            self.generator.get_model_info(),
            prompt.included
        );
        let text = self.generator.complete(&prompt.system, &prompt.user).await?;

        Ok(Answer {
            text,
            sources: results[..prompt.included].iter().map(Source::from).collect(),
        })
    }

    fn finish<T>(&mut self, result: &Result<T, RagError>) {
        self.state = match result {
            Ok(_) => RequestState::Done,
            Err(e) => {
                log::warn!("Request failed: {}", e);
                RequestState::Failed(e.to_string())
            }
        };
    }

    /// Forgets every document and message; the session starts over.
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.vector_db.clear();
        self.documents.clear();
        self.chunk_sizes.clear();
        self.history.clear();
        self.state = RequestState::Idle;
        log::info!("Session reset");
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            documents: DocumentInfo::from_summaries(&self.documents),
            chunks: ChunkInfo::from_sizes(self.chunk_sizes.iter().copied()),
            loaded: self.documents.clone(),
            indexed_chunks: self.vector_db.len(),
            messages: self.history.len(),
            state: self.state.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            llm_model: self.generator.get_model_info(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::providers::traits::GenerationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that answers with the context block it was given.
    #[derive(Default)]
    pub struct EchoGenerator {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for EchoGenerator {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let context = prompt
                .strip_prefix("Context:\n")
                .and_then(|rest| rest.split("\n\nQuestion:").next())
                .unwrap_or(prompt);
            Ok(context.to_string())
        }

        fn get_model_info(&self) -> String {
            "echo".to_string()
        }
    }

    pub struct FailingGenerator;

    #[async_trait]
    impl CompletionProvider for FailingGenerator {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Auth("invalid key".to_string()))
        }

        fn get_model_info(&self) -> String {
            "failing".to_string()
        }
    }
}
