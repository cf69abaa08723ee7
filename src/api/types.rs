//! API request and response types

use crate::upstream::{ConversationSummary, FileHandle};
use serde::{Deserialize, Serialize};

/// Request to relay one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// `?username=` query used by several endpoints
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub username: String,
}

/// Response for file upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_ids: Vec<FileHandle>,
}

/// Response with a user's conversations
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Response for a successful delete
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub conversation_id: String,
}

/// Response with suggested follow-up questions
#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub data: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
