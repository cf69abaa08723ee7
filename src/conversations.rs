//! Conversation management pass-throughs

use crate::upstream::{ConversationSummary, DeleteOutcome, UpstreamApi, UpstreamError};
use thiserror::Error;

/// How many conversations the listing asks for
pub const LIST_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

fn require_user(user: &str) -> Result<(), ConversationError> {
    if user.trim().is_empty() {
        return Err(ConversationError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// A user's conversations, newest first
pub async fn list_conversations(
    upstream: &dyn UpstreamApi,
    user: &str,
) -> Result<Vec<ConversationSummary>, ConversationError> {
    require_user(user)?;

    let page = upstream.list_conversations(user, LIST_LIMIT).await?;
    let mut conversations = page.data.unwrap_or_default();
    conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(conversations)
}

pub async fn delete_conversation(
    upstream: &dyn UpstreamApi,
    conversation_id: &str,
    user: &str,
) -> Result<(), ConversationError> {
    require_user(user)?;

    match upstream.delete_conversation(conversation_id, user).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(conversation_id, user, "Conversation deleted");
            Ok(())
        }
        DeleteOutcome::Rejected(status) => {
            tracing::debug!(conversation_id, status = %status, "Upstream refused delete");
            Err(ConversationError::NotFound(conversation_id.to_string()))
        }
    }
}

/// Follow-up questions suggested for a message
pub async fn suggested_questions(
    upstream: &dyn UpstreamApi,
    message_id: &str,
    user: &str,
) -> Result<Vec<String>, ConversationError> {
    require_user(user)?;

    let suggestions = upstream.suggested_questions(message_id, user).await?;
    Ok(suggestions.data.unwrap_or_default())
}
