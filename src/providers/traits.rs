use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A chat-completion backend: one system instruction plus one user message in,
/// one completion out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;

    fn get_model_info(&self) -> String;
}
