use serde::Serialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::database::vector_db::DistanceMetric;
use crate::document::splitter::ChunkStrategy;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY not found in environment variables. Please set it in your .env file.")]
    MissingApiKey,
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Local,
    OpenAI,
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub user_agent: String,
    pub llm_model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_strategy: ChunkStrategy,

    pub retriever_k: usize,
    pub distance_metric: DistanceMetric,
    pub max_prompt_chars: usize,

    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_api_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_cache_size: usize,

    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,

    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let embedding_backend = match get("EMBEDDING_PROVIDER", "local").to_lowercase().as_str() {
            "local" => EmbeddingBackend::Local,
            "openai" | "remote" => EmbeddingBackend::OpenAI,
            other => {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDING_PROVIDER",
                    value: other.to_string(),
                    reason: "expected `local` or `openai`".to_string(),
                })
            }
        };

        let default_embedding_model = match embedding_backend {
            EmbeddingBackend::Local => "local-hashed-bow",
            EmbeddingBackend::OpenAI => "text-embedding-3-small",
        };
        let default_dimensions = match embedding_backend {
            EmbeddingBackend::Local => "384",
            EmbeddingBackend::OpenAI => "1536",
        };

        let chunk_strategy = match get("CHUNK_STRATEGY", "fixed").to_lowercase().as_str() {
            "fixed" => ChunkStrategy::Fixed,
            "recursive" => ChunkStrategy::Recursive,
            other => {
                return Err(ConfigError::Invalid {
                    key: "CHUNK_STRATEGY",
                    value: other.to_string(),
                    reason: "expected `fixed` or `recursive`".to_string(),
                })
            }
        };

        let distance_metric = match get("DISTANCE_METRIC", "cosine").to_lowercase().as_str() {
            "cosine" => DistanceMetric::Cosine,
            "euclidean" | "l2" => DistanceMetric::Euclidean,
            other => {
                return Err(ConfigError::Invalid {
                    key: "DISTANCE_METRIC",
                    value: other.to_string(),
                    reason: "expected `cosine` or `euclidean`".to_string(),
                })
            }
        };

        let max_upload_mb = get("MAX_UPLOAD_MB", "20");
        let max_upload_bytes = parse::<usize>("MAX_UPLOAD_MB", &max_upload_mb)?
            .checked_mul(1024 * 1024)
            .ok_or_else(|| invalid("MAX_UPLOAD_MB", &max_upload_mb, "too large"))?;

        let settings = Self {
            openrouter_api_key,
            openrouter_base_url: get("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1")
                .trim_end_matches('/')
                .to_string(),
            user_agent: get("USER_AGENT", "rag-openrouter-app/1.0"),
            llm_model: get("LLM_MODEL", "nvidia/nemotron-3-nano-30b-a3b:free"),
            temperature: parse("TEMPERATURE", &get("TEMPERATURE", "0.3"))?,
            max_tokens: parse("MAX_TOKENS", &get("MAX_TOKENS", "1000"))?,

            chunk_size: parse("CHUNK_SIZE", &get("CHUNK_SIZE", "500"))?,
            chunk_overlap: parse("CHUNK_OVERLAP", &get("CHUNK_OVERLAP", "100"))?,
            chunk_strategy,

            retriever_k: parse("RETRIEVER_K", &get("RETRIEVER_K", "4"))?,
            distance_metric,
            max_prompt_chars: parse("MAX_PROMPT_CHARS", &get("MAX_PROMPT_CHARS", "12000"))?,

            embedding_backend,
            embedding_model: get("EMBEDDING_MODEL", default_embedding_model),
            embedding_dimensions: parse(
                "EMBEDDING_DIMENSIONS",
                &get("EMBEDDING_DIMENSIONS", default_dimensions),
            )?,
            embedding_api_url: get("EMBEDDING_API_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            embedding_api_key: lookup("EMBEDDING_API_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            embedding_cache_size: parse(
                "EMBEDDING_CACHE_SIZE",
                &get("EMBEDDING_CACHE_SIZE", "1024"),
            )?,

            request_timeout: Duration::from_secs(parse(
                "REQUEST_TIMEOUT_SECS",
                &get("REQUEST_TIMEOUT_SECS", "60"),
            )?),
            max_retries: parse("MAX_RETRIES", &get("MAX_RETRIES", "3"))?,
            retry_base_delay: Duration::from_millis(parse(
                "RETRY_BASE_DELAY_MS",
                &get("RETRY_BASE_DELAY_MS", "500"),
            )?),

            host: get("HOST", "0.0.0.0"),
            port: parse("PORT", &get("PORT", "8501"))?,
            max_upload_bytes,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(invalid("CHUNK_SIZE", self.chunk_size, "must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(
                "CHUNK_OVERLAP",
                self.chunk_overlap,
                "must be smaller than CHUNK_SIZE",
            ));
        }
        if self.retriever_k == 0 {
            return Err(invalid("RETRIEVER_K", self.retriever_k, "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("TEMPERATURE", self.temperature, "must be within 0.0..=2.0"));
        }
        if self.embedding_dimensions == 0 {
            return Err(invalid(
                "EMBEDDING_DIMENSIONS",
                self.embedding_dimensions,
                "must be greater than zero",
            ));
        }
        if self.max_retries == 0 {
            return Err(invalid("MAX_RETRIES", self.max_retries, "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid(
                "REQUEST_TIMEOUT_SECS",
                self.request_timeout.as_secs(),
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Non-secret settings for display in the UI and the REPL.
    pub fn get_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("LLM Model", self.llm_model.clone()),
            ("Temperature", self.temperature.to_string()),
            ("Chunk Size", self.chunk_size.to_string()),
            ("Chunk Overlap", self.chunk_overlap.to_string()),
            ("Chunk Strategy", format!("{:?}", self.chunk_strategy).to_lowercase()),
            ("Retriever K", self.retriever_k.to_string()),
            ("Distance Metric", format!("{:?}", self.distance_metric).to_lowercase()),
            ("Embedding Model", self.embedding_model.clone()),
            ("Embedding Dimensions", self.embedding_dimensions.to_string()),
        ]
    }

    /// Model name without the vendor prefix or the `:free` suffix, for the welcome banner.
    pub fn short_model_name(&self) -> String {
        let name = self.llm_model.split('/').nth(1).unwrap_or(&self.llm_model);
        name.replace(":free", "")
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);

        let err = Settings::from_lookup(lookup(&[("OPENROUTER_API_KEY", "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 100);
        assert_eq!(settings.retriever_k, 4);
        assert_eq!(settings.user_agent, "rag-openrouter-app/1.0");
        assert_eq!(settings.embedding_backend, EmbeddingBackend::Local);
        assert_eq!(settings.embedding_dimensions, 384);
        assert_eq!(settings.chunk_strategy, ChunkStrategy::Fixed);
        assert_eq!(settings.distance_metric, DistanceMetric::Cosine);
        assert_eq!(settings.port, 8501);
        assert_eq!(settings.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let err = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHUNK_OVERLAP", .. }));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("RETRIEVER_K", "four"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RETRIEVER_K", .. }));
    }

    #[test]
    fn rejects_oversized_upload_limit() {
        let err = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MAX_UPLOAD_MB", "18446744073709551615"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_UPLOAD_MB", .. }));
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let err = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "REQUEST_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn remote_embeddings_change_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("EMBEDDING_PROVIDER", "openai"),
            ("OPENROUTER_BASE_URL", "http://localhost:9999/api/v1/"),
        ]))
        .unwrap();
        assert_eq!(settings.embedding_backend, EmbeddingBackend::OpenAI);
        assert_eq!(settings.embedding_model, "text-embedding-3-small");
        assert_eq!(settings.embedding_dimensions, 1536);
        assert_eq!(settings.openrouter_base_url, "http://localhost:9999/api/v1");
    }

    #[test]
    fn short_model_name_strips_vendor_and_tier() {
        let settings = Settings::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap();
        assert_eq!(settings.short_model_name(), "nemotron-3-nano-30b-a3b");
        assert!(settings.get_info().iter().all(|(_, v)| !v.contains("sk-test")));
    }
}
