//! reqwest-backed upstream client

use super::types::{
    ChatMessageRequest, ConversationPage, DeleteOutcome, FileHandle, MessageListQuery,
    MessagePage, SuggestedQuestions, UploadFile, UploadResponse,
};
use super::{ByteStream, UpstreamApi, UpstreamError};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Upstream client over one shared connection pool.
///
/// The pool has no overall request deadline so streamed chat answers may run
/// for minutes; every non-streaming call sets `request_timeout` itself.
pub struct HttpUpstream {
    client: Client,
    base_url: Url,
    api_key: String,
    request_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            UpstreamError::invalid_request(format!("Invalid base URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::invalid_request(format!(
                "Base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let mut builder = Client::builder().connect_timeout(config.connect_timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Resolve an endpoint below the base URL, escaping each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| UpstreamError::invalid_request("Base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &(impl serde::Serialize + ?Sized),
    ) -> Result<T, UpstreamError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .query(query)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turn a non-2xx response into an error carrying its status text
async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = %status, body = %body, "Upstream returned error status");
    Err(UpstreamError::status(status))
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    async fn open_chat_stream(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ByteStream, UpstreamError> {
        let url = self.endpoint(&["chat-messages"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }

    async fn list_messages(&self, query: &MessageListQuery) -> Result<MessagePage, UpstreamError> {
        let url = self.endpoint(&["messages"])?;
        self.get_json(url, query).await
    }

    async fn upload_file(
        &self,
        file: &UploadFile,
        user: &str,
    ) -> Result<FileHandle, UpstreamError> {
        let content_type = file.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file.filename)
                .first_or_octet_stream()
                .to_string()
        });
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.filename.clone())
            .mime_str(&content_type)?;
        let form = Form::new().part("file", part).text("user", user.to_string());

        let url = self.endpoint(&["files", "upload"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let uploaded: UploadResponse = response.json().await?;

        Ok(FileHandle::new(uploaded.id))
    }

    async fn list_conversations(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<ConversationPage, UpstreamError> {
        let url = self.endpoint(&["conversations"])?;
        let limit = limit.to_string();
        self.get_json(url, &[("user", user), ("limit", limit.as_str())])
            .await
    }

    async fn delete_conversation(
        &self,
        conversation_id: &str,
        user: &str,
    ) -> Result<DeleteOutcome, UpstreamError> {
        let url = self.endpoint(&["conversations", conversation_id])?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&json!({ "user": user }))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(DeleteOutcome::Deleted),
            status => Ok(DeleteOutcome::Rejected(status)),
        }
    }

    async fn suggested_questions(
        &self,
        message_id: &str,
        user: &str,
    ) -> Result<SuggestedQuestions, UpstreamError> {
        let url = self.endpoint(&["messages", message_id, "suggested"])?;
        self.get_json(url, &[("user", user)]).await
    }
}
