use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::config::Settings;
use crate::document::{DocumentSummary, Upload};
use crate::error::RagError;
use crate::llm::chat::{ChatMessage, ChatSession, SessionInfo, Source};

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<ChatSession>>,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(session: ChatSession, settings: Settings) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            settings: Arc::new(settings),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000))]
    question: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    answer: String,
    sources: Vec<Source>,
    tokens: TokenInfo,
}

/// Whitespace-delimited word counts, not model tokens.
#[derive(Serialize)]
pub struct TokenInfo {
    input: usize,
    response: usize,
    total: usize,
}

#[derive(Serialize)]
pub struct FileReport {
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    files: Vec<FileReport>,
    indexed_chunks: usize,
}

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    info: SessionInfo,
    history: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

#[derive(Serialize)]
struct ResetResponse {
    status: String,
    session_id: Uuid,
}

#[derive(Serialize)]
struct ErrorBody {
    status: String,
    kind: String,
    error: String,
    retryable: bool,
}

/// A failed request as returned to the browser.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request",
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        let status = match &e {
            RagError::EmptyDocument { .. } => StatusCode::BAD_REQUEST,
            RagError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RagError::IndexEmpty => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::GenerationRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RagError::GenerationAuthFailure(_) | RagError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            RagError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                status: "error".to_string(),
                kind: self.kind.to_string(),
                error: self.message,
                retryable: self.retryable,
            }),
        )
            .into_response()
    }
}

/// Create and configure the API router
pub fn create_api(state: AppState) -> Router {
    let max_upload_bytes = state.settings.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    // Uploads and questions share one permit: the session is single-writer.
    let pipeline = Router::new()
        .route("/documents", post(upload_handler))
        .route("/chat", post(chat_handler))
        .layer(GlobalConcurrencyLimitLayer::new(1))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_check))
        .route("/settings", get(settings_handler))
        .route("/session", get(session_handler))
        .route("/session/reset", post(reset_handler))
        .merge(pipeline)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Binds the HTTP listener. `host` may be a name such as `localhost` as well as an IP literal.
pub async fn bind_listener(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        status: "ok".to_string(),
    })
}

async fn settings_handler(State(state): State<AppState>) -> Json<Value> {
    let info: Map<String, Value> = state
        .settings
        .get_info()
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect();
    Json(Value::Object(info))
}

async fn session_handler(State(state): State<AppState>) -> Json<SessionResponse> {
    let session = state.session.lock().await;
    Json(SessionResponse {
        info: session.info(),
        history: session.history().to_vec(),
    })
}

async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    let mut session = state.session.lock().await;
    session.reset();
    Json(ResetResponse {
        status: "reset".to_string(),
        session_id: session.id(),
    })
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError {
        status: e.status(),
        kind: "invalid_upload",
        message: format!("Multipart error: {}", e.body_text()),
        retryable: false,
    })? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| ApiError {
            status: e.status(),
            kind: "invalid_upload",
            message: format!("Failed to read '{}': {}", filename, e.body_text()),
            retryable: false,
        })?;
        uploads.push(Upload::new(filename, bytes.to_vec()));
    }

    if uploads.is_empty() {
        return Err(ApiError::bad_request("No file provided"));
    }

    let mut session = state.session.lock().await;
    let mut files = Vec::with_capacity(uploads.len());
    let mut first_error = None;
    for upload in uploads {
        let filename = upload.filename.clone();
        match session.ingest(upload).await {
            Ok(report) => files.push(FileReport {
                filename,
                document: Some(report.document),
                error: None,
            }),
            Err(e) => {
                files.push(FileReport {
                    filename,
                    document: None,
                    error: Some(e.to_string()),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    // Only a total failure is an error response; partial success lists per-file errors.
    if files.iter().all(|f| f.document.is_none()) {
        if let Some(e) = first_error {
            return Err(e.into());
        }
    }

    Ok(Json(UploadResponse {
        files,
        indexed_chunks: session.info().indexed_chunks,
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(format!("Invalid question: {}", e)))?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("Question must not be blank"));
    }

    let input_tokens = question.split_whitespace().count();
    let answer = state.session.lock().await.ask(question).await?;
    let response_tokens = answer.text.split_whitespace().count();

    Ok(Json(ChatResponse {
        answer: answer.text,
        sources: answer.sources,
        tokens: TokenInfo {
            input: input_tokens,
            response: response_tokens,
            total: input_tokens + response_tokens,
        },
    }))
}
