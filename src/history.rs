//! Conversation history reconstruction
//!
//! The upstream message list is paginated backwards: each page is older
//! than the one before it and the next page is requested with the id of
//! the current page's first message as an exclusive cursor. Every message
//! is prepended as it arrives, so the finished transcript runs oldest
//! first.

#[cfg(test)]
mod proptests;

use crate::upstream::{MessageListQuery, PageItem, UpstreamApi, UpstreamError, UpstreamMessage};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// One exchange as the client sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub answer: String,
    pub message_files: Vec<Value>,
    /// Unix seconds
    pub created_at: i64,
}

impl From<UpstreamMessage> for HistoryEntry {
    fn from(message: UpstreamMessage) -> Self {
        Self {
            query: message.query.unwrap_or_default(),
            answer: message.answer.unwrap_or_default(),
            message_files: message.message_files.unwrap_or_default(),
            created_at: message.created_at.unwrap_or_default(),
        }
    }
}

/// Full conversation, oldest first
pub type Transcript = Vec<HistoryEntry>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Walk every page of a conversation and merge them oldest first.
///
/// Stops early, without failing, when a page has no usable `data`, is
/// empty, or would move the cursor to an id it has already used. Upstream call failures are returned as
/// errors.
pub async fn reconstruct(
    upstream: &dyn UpstreamApi,
    conversation_id: &str,
    user: &str,
    page_size: u32,
) -> Result<Transcript, HistoryError> {
    if user.trim().is_empty() {
        return Err(HistoryError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }

    let mut merged: VecDeque<UpstreamMessage> = VecDeque::new();
    let mut cursor: Option<String> = None;
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let query = MessageListQuery {
            conversation_id: conversation_id.to_string(),
            user: user.to_string(),
            limit: page_size,
            first_id: cursor.clone(),
        };
        let page = upstream.list_messages(&query).await?;
        pages += 1;

        let Some(items) = page.data else {
            tracing::warn!(conversation_id, pages, "Message page without data, stopping");
            break;
        };

        if items.is_empty() {
            if page.has_more {
                tracing::warn!(
                    conversation_id,
                    pages,
                    "Empty message page claims more pages, stopping"
                );
            }
            break;
        }

        // Cursor for the next request: first entry of this page
        let next_cursor = match &items[0] {
            PageItem::Message(first) if !first.id.is_empty() => Some(first.id.clone()),
            _ => None,
        };

        for item in items {
            match item {
                PageItem::Message(message) => merged.push_front(message),
                PageItem::Unrecognized(value) => {
                    tracing::warn!(conversation_id, value = %value, "Skipping unrecognized page entry");
                }
            }
        }

        if !page.has_more {
            break;
        }

        match next_cursor {
            Some(id) if seen_cursors.insert(id.clone()) => cursor = Some(id),
            _ => {
                tracing::warn!(
                    conversation_id,
                    pages,
                    "Cannot advance message cursor, stopping"
                );
                break;
            }
        }
    }

    tracing::debug!(conversation_id, pages, messages = merged.len(), "History reconstructed");
    Ok(merged.into_iter().map(HistoryEntry::from).collect())
}
