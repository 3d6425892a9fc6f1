use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use async_trait::async_trait;

use crate::config::Settings;
use crate::llm::embeddings::{Embedder, EmbeddingError};

/// Remote embeddings from any OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(settings: &Settings) -> Result<Self, EmbeddingError> {
        let api_key = settings
            .embedding_api_key
            .clone()
            .unwrap_or_else(|| settings.openrouter_api_key.clone());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(settings.embedding_api_url.clone());

        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| EmbeddingError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model: settings.embedding_model.clone(),
            dimensions: settings.embedding_dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(
                texts.iter().map(|t| t.to_string()).collect(),
            ))
            .build()
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: data.len(),
            });
        }
        data.sort_by_key(|entry| entry.index);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|entry| entry.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
