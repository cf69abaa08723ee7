//! Wire types for the upstream chat service

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Upstream payloads are not always well typed. These helpers accept any JSON
// value for a field and keep it only when it has the expected shape, so one
// odd field cannot fail a whole response.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// Unix seconds given as an integer, a float or a numeric string
fn unix_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[allow(clippy::cast_possible_truncation)]
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    };
    Ok(seconds)
}

fn unix_seconds_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(unix_seconds(deserializer)?.unwrap_or_default())
}

/// Body of the upstream "send chat message" call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessageRequest {
    pub query: String,
    pub user: String,
    /// Auxiliary input variables; always empty here
    pub inputs: Map<String, Value>,
    pub files: Vec<FileDescriptor>,
    /// Empty starts a new conversation
    pub conversation_id: String,
    pub response_mode: ResponseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Streaming,
}

/// File reference attached to a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub r#type: String,
    pub transfer_method: String,
    pub upload_file_id: String,
}

impl FileDescriptor {
    /// Uploaded files are always sent as locally stored images
    pub fn local_image(handle: &FileHandle) -> Self {
        Self {
            r#type: "image".to_string(),
            transfer_method: "local_file".to_string(),
            upload_file_id: handle.as_str().to_string(),
        }
    }
}

/// Opaque upstream-issued id of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One file received from the client, to be re-uploaded
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub id: String,
}

/// Query for one page of the upstream "list messages" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageListQuery {
    pub conversation_id: String,
    pub user: String,
    pub limit: u32,
    /// Exclusive upper bound: only messages older than this id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_id: Option<String>,
}

/// One page of messages, newest page first
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePage {
    /// `None` when the upstream omitted the field or sent something other
    /// than an array
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<Vec<PageItem>>,
    /// Anything but `true` means no more pages
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub has_more: bool,
}

/// Entry of a message page. Any object decodes as a message, with
/// mistyped fields dropped; anything else is kept as `Unrecognized` so a
/// single odd entry does not fail the whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageItem {
    Message(UpstreamMessage),
    Unrecognized(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message_files: Option<Vec<Value>>,
    /// Unix seconds
    #[serde(default, deserialize_with = "unix_seconds")]
    pub created_at: Option<i64>,
}

/// Upstream conversation listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationPage {
    #[serde(default)]
    pub data: Option<Vec<ConversationSummary>>,
}

/// Conversation as returned upstream. Fields we do not use are passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "unix_seconds_or_zero")]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Suggested follow-up questions for a message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestedQuestions {
    #[serde(default)]
    pub data: Option<Vec<String>>,
}

/// Outcome of an upstream conversation delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Upstream answered but not with 204
    Rejected(reqwest::StatusCode),
}
