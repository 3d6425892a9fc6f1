use async_trait::async_trait;
use std::sync::Arc;

use rust_rag_assistant::database::DistanceMetric;
use rust_rag_assistant::document::{ChunkConfig, Upload};
use rust_rag_assistant::llm::{ChatSession, LocalEmbedder, SessionConfig};
use rust_rag_assistant::providers::{CompletionProvider, GenerationError};
use rust_rag_assistant::RagError;

const CHUNK: usize = 80;

/// Replies with the context section of the prompt it receives.
struct ContextEcho;

#[async_trait]
impl CompletionProvider for ContextEcho {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, GenerationError> {
        let context = prompt
            .strip_prefix("Context:\n")
            .and_then(|rest| rest.split("\n\nQuestion:").next())
            .ok_or_else(|| GenerationError::MalformedResponse("unexpected prompt layout".to_string()))?;
        Ok(context.to_string())
    }

    fn get_model_info(&self) -> String {
        "context-echo".to_string()
    }
}

fn padded(sentence: &str) -> String {
    assert!(sentence.len() <= CHUNK);
    format!("{:<width$}", sentence, width = CHUNK)
}

fn session(top_k: usize) -> ChatSession {
    let config = SessionConfig {
        chunk: ChunkConfig::new(CHUNK, 0).unwrap(),
        retriever_k: top_k,
        distance_metric: DistanceMetric::Cosine,
        max_prompt_chars: 12_000,
    };
    ChatSession::new(Arc::new(LocalEmbedder::new(384)), Arc::new(ContextEcho), config)
}

const FIRST: &str = "Alpine lakes freeze in winter and thaw slowly during the spring months.";
const SECOND: &str = "The secret launch code for the rocket is stored in vault number seventeen.";
const THIRD: &str = "Garden tomatoes need full sun, regular watering and rich compost soil.";

#[tokio::test]
async fn answer_comes_from_the_only_relevant_chunk() {
    let text = format!("{}{}{}", padded(FIRST), padded(SECOND), padded(THIRD));
    let mut session = session(1);

    let report = session.ingest(Upload::new("facts.txt", text)).await.unwrap();
    assert_eq!(report.document.chunks, 3);

    let answer = session
        .ask("Where is the launch code for the rocket stored?")
        .await
        .unwrap();

    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk_index, 1);
    assert!(answer.text.contains("vault number seventeen"));
    assert!(!answer.text.contains("Alpine"));
    assert!(!answer.text.contains("tomatoes"));
}

#[tokio::test]
async fn relevant_chunk_ranks_first_among_all() {
    let text = format!("{}{}{}", padded(FIRST), padded(SECOND), padded(THIRD));
    let mut session = session(3);
    session.ingest(Upload::new("facts.txt", text)).await.unwrap();

    let answer = session.ask("Which vault holds the rocket launch code?").await.unwrap();
    let ranks: Vec<usize> = answer.sources.iter().map(|s| s.chunk_index).collect();
    assert_eq!(ranks.len(), 3);
    assert_eq!(ranks[0], 1);
    for pair in answer.sources.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn asking_an_empty_index_is_index_empty() {
    let mut session = session(4);
    assert_eq!(session.ask("Anything at all?").await.unwrap_err(), RagError::IndexEmpty);
    assert!(session.history().is_empty());
}
