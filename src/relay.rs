//! Live chat relay
//!
//! One chat turn becomes one spawned task: it opens the upstream stream,
//! drives the frame parser over the body and pushes [`RelayChunk`]s into a
//! channel that backs the client response body. Nothing is shared between
//! sessions except the upstream client itself.

pub mod frames;

pub use frames::{frames, FrameError, UpstreamFrame};

use crate::upstream::{ChatMessageRequest, FileDescriptor, FileHandle, ResponseMode, UpstreamApi};
use bytes::Bytes;
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

/// Prefix of the in-band error sentinel
pub const ERROR_PREFIX: &str = "[ERROR]";
const CHANNEL_CAPACITY: usize = 64;

/// Output of a relay session, in client order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayChunk {
    /// Answer text, forwarded as-is
    Text(String),
    /// The answer is complete; emitted at most once
    End { message_id: String },
    /// The session failed; nothing follows
    Error(String),
}

impl RelayChunk {
    /// Wire form written to the client body
    pub fn into_bytes(self) -> Bytes {
        match self {
            RelayChunk::Text(text) => Bytes::from(text),
            RelayChunk::End { message_id } => Bytes::from(format!("[MESSAGE_ID:{message_id}]")),
            RelayChunk::Error(message) => Bytes::from(format!("{ERROR_PREFIX} {message}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),
}

/// A validated chat turn from one client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub message: String,
    pub user: String,
    /// Empty starts a new conversation
    pub conversation_id: String,
    pub file_ids: Vec<FileHandle>,
}

impl ChatTurn {
    pub fn new(
        message: impl Into<String>,
        user: impl Into<String>,
        conversation_id: impl Into<String>,
        file_ids: Vec<FileHandle>,
    ) -> Result<Self, RelayError> {
        let message = message.into();
        let user = user.into();

        if message.trim().is_empty() {
            return Err(RelayError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }
        if user.trim().is_empty() {
            return Err(RelayError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }

        Ok(Self {
            message,
            user,
            conversation_id: conversation_id.into(),
            file_ids,
        })
    }

    pub fn to_upstream_request(&self) -> ChatMessageRequest {
        ChatMessageRequest {
            query: self.message.clone(),
            user: self.user.clone(),
            inputs: serde_json::Map::new(),
            files: self
                .file_ids
                .iter()
                .map(FileDescriptor::local_image)
                .collect(),
            conversation_id: self.conversation_id.clone(),
            response_mode: ResponseMode::Streaming,
        }
    }
}

/// Per-session bookkeeping: maps frames to client output
#[derive(Debug, Default)]
struct RelayState {
    /// Last message id seen on a `message` frame
    message_id: Option<String>,
    ended: bool,
    text_chunks: usize,
}

impl RelayState {
    fn apply(&mut self, frame: UpstreamFrame) -> Option<RelayChunk> {
        if self.ended {
            // Drained without output once the end marker went out
            return None;
        }
        match frame {
            UpstreamFrame::Message { answer, message_id } => {
                self.message_id = Some(message_id);
                if answer.is_empty() {
                    return None;
                }
                self.text_chunks += 1;
                Some(RelayChunk::Text(answer))
            }
            UpstreamFrame::MessageEnd { message_id } => {
                self.ended = true;
                let message_id = self
                    .message_id
                    .clone()
                    .or(message_id)
                    .unwrap_or_default();
                Some(RelayChunk::End { message_id })
            }
            UpstreamFrame::Other => None,
        }
    }
}

/// Start a relay session and return the client-facing chunk stream.
///
/// The session stops on its own once the returned stream is dropped.
pub fn spawn_relay(upstream: Arc<dyn UpstreamApi>, turn: ChatTurn) -> ReceiverStream<RelayChunk> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let span = tracing::info_span!(
        "relay",
        conversation_id = %turn.conversation_id,
        user = %turn.user,
    );
    tokio::spawn(run_relay(upstream, turn, tx).instrument(span));
    ReceiverStream::new(rx)
}

/// Body of a relay session
pub async fn run_relay(
    upstream: Arc<dyn UpstreamApi>,
    turn: ChatTurn,
    tx: mpsc::Sender<RelayChunk>,
) {
    let request = turn.to_upstream_request();

    let body = tokio::select! {
        () = tx.closed() => {
            tracing::debug!("Client went away before upstream answered");
            return;
        }
        opened = upstream.open_chat_stream(&request) => match opened {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(kind = ?e.kind, error = %e, "Could not open upstream chat stream");
                let _ = tx.send(RelayChunk::Error(format!("AI service error: {e}"))).await;
                return;
            }
        },
    };

    let mut events = pin!(frames(body));
    let mut state = RelayState::default();

    loop {
        let next = tokio::select! {
            () = tx.closed() => {
                tracing::debug!(text_chunks = state.text_chunks, "Client disconnected mid-stream");
                return;
            }
            next = events.next() => next,
        };

        match next {
            None => break,
            Some(Ok(frame)) => {
                if let Some(chunk) = state.apply(frame) {
                    if tx.send(chunk).await.is_err() {
                        tracing::debug!(text_chunks = state.text_chunks, "Client disconnected mid-stream");
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, text_chunks = state.text_chunks, "Upstream stream failed");
                let _ = tx.send(RelayChunk::Error(e.to_string())).await;
                return;
            }
        }
    }

    if state.ended {
        tracing::info!(
            text_chunks = state.text_chunks,
            message_id = state.message_id.as_deref().unwrap_or_default(),
            "Relay completed"
        );
    } else {
        tracing::warn!(
            text_chunks = state.text_chunks,
            "Upstream closed without message_end"
        );
    }
}
