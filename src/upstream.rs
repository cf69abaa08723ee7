//! Upstream chat service abstraction
//!
//! Everything the relay needs from the upstream service goes through
//! [`UpstreamApi`], so the relay, history and file logic can be driven by
//! the HTTP client in production and by a mock in tests.

mod client;
mod error;
mod types;

#[cfg(test)]
pub mod testing;

pub use client::HttpUpstream;
pub use error::{UpstreamError, UpstreamErrorKind};
pub use types::*;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Raw body of a streamed upstream response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Calls the relay makes against the upstream service
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Send a chat message in streaming mode and return the raw event-stream body.
    /// Fails if the connection cannot be opened or the status is not 2xx.
    async fn open_chat_stream(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ByteStream, UpstreamError>;

    /// Fetch one page of a conversation's messages
    async fn list_messages(&self, query: &MessageListQuery) -> Result<MessagePage, UpstreamError>;

    /// Store one file upstream and return its handle
    async fn upload_file(&self, file: &UploadFile, user: &str)
        -> Result<FileHandle, UpstreamError>;

    /// List a user's conversations
    async fn list_conversations(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<ConversationPage, UpstreamError>;

    /// Delete a conversation
    async fn delete_conversation(
        &self,
        conversation_id: &str,
        user: &str,
    ) -> Result<DeleteOutcome, UpstreamError>;

    /// Suggested follow-up questions for a message
    async fn suggested_questions(
        &self,
        message_id: &str,
        user: &str,
    ) -> Result<SuggestedQuestions, UpstreamError>;
}

/// Logging wrapper for upstream clients
pub struct LoggingUpstream {
    inner: Arc<dyn UpstreamApi>,
}

impl LoggingUpstream {
    pub fn new(inner: Arc<dyn UpstreamApi>) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(operation: &'static str, start: Instant, result: &Result<T, UpstreamError>) {
    let duration_ms = start.elapsed().as_millis();
    match result {
        Ok(_) => {
            tracing::info!(operation, duration_ms = %duration_ms, "Upstream request completed");
        }
        Err(e) => {
            tracing::error!(
                operation,
                duration_ms = %duration_ms,
                kind = ?e.kind,
                error = %e.message,
                "Upstream request failed"
            );
        }
    }
}

#[async_trait]
impl UpstreamApi for LoggingUpstream {
    async fn open_chat_stream(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ByteStream, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.open_chat_stream(request).await;
        // Only covers time to first byte; the body is still streaming
        log_outcome("open_chat_stream", start, &result);
        result
    }

    async fn list_messages(&self, query: &MessageListQuery) -> Result<MessagePage, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.list_messages(query).await;
        log_outcome("list_messages", start, &result);
        result
    }

    async fn upload_file(
        &self,
        file: &UploadFile,
        user: &str,
    ) -> Result<FileHandle, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.upload_file(file, user).await;
        log_outcome("upload_file", start, &result);
        result
    }

    async fn list_conversations(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<ConversationPage, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.list_conversations(user, limit).await;
        log_outcome("list_conversations", start, &result);
        result
    }

    async fn delete_conversation(
        &self,
        conversation_id: &str,
        user: &str,
    ) -> Result<DeleteOutcome, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.delete_conversation(conversation_id, user).await;
        log_outcome("delete_conversation", start, &result);
        result
    }

    async fn suggested_questions(
        &self,
        message_id: &str,
        user: &str,
    ) -> Result<SuggestedQuestions, UpstreamError> {
        let start = Instant::now();
        let result = self.inner.suggested_questions(message_id, user).await;
        log_outcome("suggested_questions", start, &result);
        result
    }
}
