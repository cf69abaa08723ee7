//! Mock upstream for testing
//!
//! Responses are queued per call type and handed out in order; every
//! request is recorded so tests can assert on what reached the upstream.

use super::types::{
    ChatMessageRequest, ConversationPage, DeleteOutcome, FileHandle, MessageListQuery,
    MessagePage, PageItem, SuggestedQuestions, UploadFile, UpstreamMessage,
};
use super::{ByteStream, UpstreamApi, UpstreamError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted body for one chat stream
pub enum MockChat {
    /// Body chunks, after which the stream ends
    Chunks(Vec<Result<Bytes, std::io::Error>>),
    /// Body chunks, after which the stream stays open forever
    ChunksThenHang(Vec<Result<Bytes, std::io::Error>>),
    /// Opening the stream fails
    Fail(UpstreamError),
}

pub struct MockUpstream {
    chats: Mutex<VecDeque<MockChat>>,
    pages: Mutex<VecDeque<Result<MessagePage, UpstreamError>>>,
    uploads: Mutex<VecDeque<Result<FileHandle, UpstreamError>>>,
    conversations: Mutex<VecDeque<Result<ConversationPage, UpstreamError>>>,
    deletes: Mutex<VecDeque<Result<DeleteOutcome, UpstreamError>>>,
    suggestions: Mutex<VecDeque<Result<SuggestedQuestions, UpstreamError>>>,
    /// Record of all requests made
    pub chat_requests: Mutex<Vec<ChatMessageRequest>>,
    pub page_queries: Mutex<Vec<MessageListQuery>>,
    pub uploaded: Mutex<Vec<(String, String)>>,
    pub other_calls: Mutex<Vec<String>>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            chats: Mutex::new(VecDeque::new()),
            pages: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(VecDeque::new()),
            conversations: Mutex::new(VecDeque::new()),
            deletes: Mutex::new(VecDeque::new()),
            suggestions: Mutex::new(VecDeque::new()),
            chat_requests: Mutex::new(Vec::new()),
            page_queries: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            other_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_chat(&self, chat: MockChat) {
        self.chats.lock().unwrap().push_back(chat);
    }

    /// Queue a chat stream made of `data:` lines, one per JSON payload
    pub fn queue_chat_events(&self, payloads: &[&str]) {
        self.queue_chat(MockChat::Chunks(sse_chunks(payloads)));
    }

    pub fn queue_page(&self, page: Result<MessagePage, UpstreamError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn queue_upload(&self, result: Result<FileHandle, UpstreamError>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn queue_conversations(&self, result: Result<ConversationPage, UpstreamError>) {
        self.conversations.lock().unwrap().push_back(result);
    }

    pub fn queue_delete(&self, result: Result<DeleteOutcome, UpstreamError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn queue_suggestions(&self, result: Result<SuggestedQuestions, UpstreamError>) {
        self.suggestions.lock().unwrap().push_back(result);
    }

    pub fn recorded_chats(&self) -> Vec<ChatMessageRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn recorded_queries(&self) -> Vec<MessageListQuery> {
        self.page_queries.lock().unwrap().clone()
    }

    /// `(filename, user)` for each upload attempt
    pub fn recorded_uploads(&self) -> Vec<(String, String)> {
        self.uploaded.lock().unwrap().clone()
    }

    /// Total number of upstream calls of any kind
    pub fn call_count(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
            + self.page_queries.lock().unwrap().len()
            + self.uploaded.lock().unwrap().len()
            + self.other_calls.lock().unwrap().len()
    }
}

/// Encode payloads as an event-stream body, one chunk per event
pub fn sse_chunks(payloads: &[&str]) -> Vec<Result<Bytes, std::io::Error>> {
    payloads
        .iter()
        .map(|p| Ok(Bytes::from(format!("data: {p}\n\n"))))
        .collect()
}

/// Build a page from `(id, query, answer, created_at)` tuples
pub fn page(messages: &[(&str, &str, &str, i64)], has_more: bool) -> MessagePage {
    MessagePage {
        data: Some(
            messages
                .iter()
                .map(|(id, query, answer, created_at)| {
                    PageItem::Message(UpstreamMessage {
                        id: (*id).to_string(),
                        query: Some((*query).to_string()),
                        answer: Some((*answer).to_string()),
                        message_files: Some(vec![]),
                        created_at: Some(*created_at),
                    })
                })
                .collect(),
        ),
        has_more,
    }
}

fn exhausted(what: &str) -> UpstreamError {
    UpstreamError::network(format!("No mock {what} queued"))
}

#[async_trait]
impl UpstreamApi for MockUpstream {
    async fn open_chat_stream(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ByteStream, UpstreamError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        let next = self.chats.lock().unwrap().pop_front();
        match next {
            Some(MockChat::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(chunks))),
            Some(MockChat::ChunksThenHang(chunks)) => Ok(Box::pin(
                futures::stream::iter(chunks).chain(futures::stream::pending()),
            )),
            Some(MockChat::Fail(e)) => Err(e),
            None => Err(exhausted("chat stream")),
        }
    }

    async fn list_messages(&self, query: &MessageListQuery) -> Result<MessagePage, UpstreamError> {
        self.page_queries.lock().unwrap().push(query.clone());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("message page")))
    }

    async fn upload_file(
        &self,
        file: &UploadFile,
        user: &str,
    ) -> Result<FileHandle, UpstreamError> {
        self.uploaded
            .lock()
            .unwrap()
            .push((file.filename.clone(), user.to_string()));
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("upload")))
    }

    async fn list_conversations(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<ConversationPage, UpstreamError> {
        self.other_calls
            .lock()
            .unwrap()
            .push(format!("list_conversations {user} {limit}"));
        self.conversations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("conversation list")))
    }

    async fn delete_conversation(
        &self,
        conversation_id: &str,
        user: &str,
    ) -> Result<DeleteOutcome, UpstreamError> {
        self.other_calls
            .lock()
            .unwrap()
            .push(format!("delete_conversation {conversation_id} {user}"));
        self.deletes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("delete")))
    }

    async fn suggested_questions(
        &self,
        message_id: &str,
        user: &str,
    ) -> Result<SuggestedQuestions, UpstreamError> {
        self.other_calls
            .lock()
            .unwrap()
            .push(format!("suggested_questions {message_id} {user}"));
        self.suggestions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("suggestions")))
    }
}
