use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::Settings;
use crate::providers::traits::{CompletionProvider, GenerationError};
use crate::providers::utils::retry_backoff;

const REFERER: &str = "http://localhost:8501";
const APP_TITLE: &str = "RAG Document Assistant";

/// Chat completions against OpenRouter (or any OpenAI-compatible endpoint).
#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OpenRouterProvider {
    pub fn new(settings: &Settings) -> Result<Self, GenerationError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.openrouter_api_key))
            .map_err(|_| GenerationError::Auth("API key contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("http-referer", HeaderValue::from_static(REFERER));
        headers.insert("x-title", HeaderValue::from_static(APP_TITLE));

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.openrouter_base_url),
            model: settings.llm_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries.max(1),
            retry_base_delay: settings.retry_base_delay,
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, GenerationError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_completion(status, &text)
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&body).await {
                Ok(answer) => return Ok(answer),
                Err(e) if is_rate_limit(&e) => {
                    if attempt >= self.max_retries {
                        log::error!("Rate limited by {} after {} attempts", self.endpoint, attempt);
                        return Err(GenerationError::RateLimited { attempts: attempt });
                    }
                    let delay = retry_backoff(self.retry_base_delay, attempt - 1);
                    log::warn!(
                        "Rate limited (attempt {}/{}), retrying in {:?}",
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    log::error!("Generation request failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn get_model_info(&self) -> String {
        self.model.clone()
    }
}

fn is_rate_limit(err: &GenerationError) -> bool {
    matches!(err, GenerationError::Api { status: 429, .. })
}

/// Classifies one HTTP exchange. OpenRouter sometimes reports upstream errors
/// inside a 200 body as `{"error": {"code": ..., "message": ...}}`, so the body
/// code takes part in classification too.
fn parse_completion(status: StatusCode, body: &str) -> Result<String, GenerationError> {
    let json: Option<Value> = serde_json::from_str(body).ok();

    let error = json.as_ref().and_then(|j| j.get("error"));
    let body_code = error.and_then(|e| {
        e.get("code")
            .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
    });
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(300).collect());

    let code = if !status.is_success() {
        status.as_u16()
    } else {
        body_code.map(|c| c as u16).unwrap_or(status.as_u16())
    };

    match code {
        401 | 403 => return Err(GenerationError::Auth(message)),
        200..=299 if error.is_none() => {}
        _ => return Err(GenerationError::Api { status: code, message }),
    }

    let json = json.ok_or_else(|| GenerationError::MalformedResponse("response body is not JSON".to_string()))?;
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| GenerationError::MalformedResponse("missing choices[0].message.content".to_string()))?;

    let content = content.trim();
    if content.is_empty() {
        return Err(GenerationError::MalformedResponse("empty completion".to_string()));
    }
    Ok(content.to_string())
}
