//! HTTP request handlers

use super::stream::relay_response;
use super::types::{
    ChatRequest, ConversationListResponse, DeleteResponse, ErrorResponse, HealthResponse,
    SuggestionsResponse, UploadResponse, UserQuery,
};
use super::AppState;
use crate::conversations::{self, ConversationError};
use crate::files::{upload_all, FileRelayError};
use crate::history::{reconstruct, HistoryEntry, HistoryError};
use crate::relay::{spawn_relay, ChatTurn, RelayError};
use crate::upstream::{FileHandle, UploadFile, UpstreamError};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Largest multipart body accepted by the upload endpoint
const UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Live chat relay
        .route("/api/chat", post(chat))
        .route(
            "/api/chat/next_suggest/:message_id",
            get(next_suggestions),
        )
        // History and conversation management
        .route(
            "/api/conversations/:conversation_id/history",
            get(get_history),
        )
        .route(
            "/api/conversations/list/:username",
            get(list_conversations),
        )
        .route(
            "/api/conversations/:conversation_id/delete",
            delete(delete_conversation),
        )
        // File relay
        .route(
            "/api/file/upload",
            post(upload_files).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Relay
// ============================================================

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;

    let file_ids = req.file_ids.into_iter().map(FileHandle::new).collect();
    let turn = ChatTurn::new(req.message, req.username, req.conversation_id, file_ids)?;

    tracing::info!(
        user = %turn.user,
        conversation_id = %turn.conversation_id,
        files = turn.file_ids.len(),
        "Relaying chat turn"
    );

    let response = relay_response(spawn_relay(state.upstream.clone(), turn))
        .map_err(|_| AppError::Internal("Failed to start stream".to_string()))?;
    Ok(response)
}

async fn next_suggestions(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let data =
        conversations::suggested_questions(state.upstream.as_ref(), &message_id, &query.username)
            .await?;
    Ok(Json(SuggestionsResponse { data }))
}

// ============================================================
// History
// ============================================================

async fn get_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let transcript = reconstruct(
        state.upstream.as_ref(),
        &conversation_id,
        &query.username,
        state.history_page_limit,
    )
    .await?;
    Ok(Json(transcript))
}

// ============================================================
// Conversation Management
// ============================================================

async fn list_conversations(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations =
        conversations::list_conversations(state.upstream.as_ref(), &username).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    conversations::delete_conversation(state.upstream.as_ref(), &conversation_id, &query.username)
        .await?;
    Ok(Json(DeleteResponse {
        message: "Conversation deleted".to_string(),
        conversation_id,
    }))
}

// ============================================================
// File Relay
// ============================================================

async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut username = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("files") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Cannot read {filename}: {e}")))?;
                files.push(UploadFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some("username") => {
                username = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid username field: {e}")))?;
            }
            _ => {}
        }
    }

    let file_ids = upload_all(state.upstream.as_ref(), &username, files).await?;
    Ok(Json(UploadResponse { file_ids }))
}

// ============================================================
// Health / Version
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: env!("CARGO_PKG_NAME"),
    })
}

async fn get_version() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::BadGateway(format!("AI service error: {e}"))
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidInput(msg) => AppError::BadRequest(msg),
        }
    }
}

impl From<HistoryError> for AppError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::InvalidInput(msg) => AppError::BadRequest(msg),
            HistoryError::Upstream(e) => e.into(),
        }
    }
}

impl From<FileRelayError> for AppError {
    fn from(e: FileRelayError) -> Self {
        match e {
            FileRelayError::InvalidInput(msg) => AppError::BadRequest(msg),
            e @ FileRelayError::Upload { .. } => AppError::BadGateway(e.to_string()),
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::InvalidInput(msg) => AppError::BadRequest(msg),
            e @ ConversationError::NotFound(_) => AppError::NotFound(e.to_string()),
            ConversationError::Upstream(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
