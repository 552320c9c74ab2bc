//! HTTP API for the comprehension service.
//!
//! Exposes the document workflow over JSON/multipart endpoints so web and
//! mobile clients can drive the full loop: upload, question generation,
//! and answer scoring.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Upload a PDF, ingest it, return first questions |
//! | `GET`  | `/documents` | List ingested documents |
//! | `POST` | `/documents/{id}/questions` | Generate follow-up questions |
//! | `POST` | `/documents/{id}/answers` | Score a typed answer |
//! | `POST` | `/documents/{id}/audio-answers` | Transcribe and score a spoken answer |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a flat JSON body:
//!
//! ```json
//! { "error": "document abc123 not found" }
//! ```
//!
//! Status mapping: `NotFound` → 404; vector/validation errors → 400;
//! extraction and transcription failures → 422 (the request was well-formed,
//! the payload was not); upstream provider failures → 502; store failures
//! → 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::Error;
use crate::extract::MIME_PDF;
use crate::models::{Document, Question};
use crate::workflow::Workflow;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    workflow: Arc<Workflow>,
}

/// Starts the HTTP server on `bind_addr`, serving `workflow`.
///
/// Runs until the process is terminated.
pub async fn run_server(workflow: Arc<Workflow>, bind_addr: &str) -> anyhow::Result<()> {
    let state = AppState { workflow };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/documents", post(handle_upload).get(handle_list_documents))
        .route("/documents/{id}/questions", post(handle_more_questions))
        .route("/documents/{id}/answers", post(handle_answer))
        .route("/documents/{id}/audio-answers", post(handle_audio_answer))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidVector(_) | Error::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            Error::ExtractionFailed(_) | Error::TranscriptionFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::EmbeddingUnavailable(_) | Error::GenerationFailed(_) | Error::UploadFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct QuestionView {
    id: String,
    text: String,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
        }
    }
}

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    storage_uri: String,
    questions: Vec<QuestionView>,
}

/// `POST /documents` — multipart upload: `file` (required, PDF) and
/// `owner_id` (optional text).
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Vec<u8>, String)> = None;
    let mut owner_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field
                    .file_name()
                    .unwrap_or("upload.pdf")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(MIME_PDF)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file: {}", e)))?;
                file = Some((name, bytes.to_vec(), content_type));
            }
            Some("owner_id") => {
                owner_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid owner_id: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let (name, bytes, content_type) = file.ok_or_else(|| bad_request("missing 'file' field"))?;
    if bytes.is_empty() {
        return Err(bad_request("uploaded file is empty"));
    }

    let outcome = state
        .workflow
        .ingest(&name, &bytes, &content_type, owner_id.as_deref())
        .await?;

    let body = UploadResponse {
        document_id: outcome.document_id,
        storage_uri: outcome.storage_uri,
        questions: outcome.questions.into_iter().map(Into::into).collect(),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Serialize)]
struct DocumentView {
    id: String,
    title: String,
    storage_uri: String,
    owner_id: Option<String>,
    created_at: i64,
}

impl From<Document> for DocumentView {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            title: d.title,
            storage_uri: d.storage_uri,
            owner_id: d.owner_id,
            created_at: d.created_at,
        }
    }
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentView>,
}

/// `GET /documents` — list ingested documents, most recent first.
async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.workflow.store().list_documents().await?;
    Ok(Json(DocumentListResponse {
        documents: documents.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize)]
struct QuestionsResponse {
    questions: Vec<QuestionView>,
}

/// `POST /documents/{id}/questions` — generate a follow-up batch.
async fn handle_more_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionsResponse>, AppError> {
    let questions = state.workflow.more_questions(&id).await?;
    Ok(Json(QuestionsResponse {
        questions: questions.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct AnswerRequest {
    #[serde(default)]
    question_id: Option<String>,
    user_id: String,
    text: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    response_id: String,
    evaluation_id: String,
    score: i64,
}

/// `POST /documents/{id}/answers` — score a typed answer.
async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("answer text must not be empty"));
    }
    if req.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }

    let outcome = state
        .workflow
        .answer(&id, req.question_id.as_deref(), &req.user_id, &req.text)
        .await?;

    Ok(Json(AnswerResponse {
        response_id: outcome.response_id,
        evaluation_id: outcome.evaluation_id,
        score: outcome.score,
    }))
}

#[derive(Serialize)]
struct AudioAnswerResponse {
    transcript: String,
    response_id: String,
    evaluation_id: String,
    score: i64,
}

/// `POST /documents/{id}/audio-answers` — multipart: `file` (required,
/// audio), `user_id` (required text), `question_id` (optional text).
async fn handle_audio_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<AudioAnswerResponse>, AppError> {
    let mut audio: Option<(Vec<u8>, String)> = None;
    let mut user_id: Option<String> = None;
    let mut question_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file: {}", e)))?;
                audio = Some((bytes.to_vec(), content_type));
            }
            Some("user_id") => {
                user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid user_id: {}", e)))?,
                );
            }
            Some("question_id") => {
                question_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid question_id: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let (bytes, media_type) = audio.ok_or_else(|| bad_request("missing 'file' field"))?;
    let user_id = user_id.ok_or_else(|| bad_request("missing 'user_id' field"))?;
    if bytes.is_empty() {
        return Err(bad_request("uploaded audio is empty"));
    }

    let outcome = state
        .workflow
        .audio_answer(&id, question_id.as_deref(), &user_id, &bytes, &media_type)
        .await?;

    Ok(Json(AudioAnswerResponse {
        transcript: outcome.transcript,
        response_id: outcome.answer.response_id,
        evaluation_id: outcome.answer.evaluation_id,
        score: outcome.answer.score,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        let cases: Vec<(Error, StatusCode)> = vec![
            (
                Error::NotFound("document x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::DimensionMismatch {
                    expected: 3,
                    actual: 2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::InvalidVector("zero-norm".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::ExtractionFailed("bad pdf".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Error::TranscriptionFailed("no endpoint".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Error::EmbeddingUnavailable("api down".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::GenerationFailed("api down".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::UploadFailed("bucket gone".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::StoreUnavailable("db locked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let app_err: AppError = err.into();
            assert_eq!(app_err.status, expected, "{}", app_err.message);
        }
    }
}
