//! Upstream error types

use reqwest::StatusCode;
use thiserror::Error;

/// Upstream error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
    /// HTTP status when the upstream answered with a non-success code
    pub status: Option<StatusCode>,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Decode, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidRequest, message)
    }

    /// Non-success response; the message carries the upstream status text
    pub fn status(status: StatusCode) -> Self {
        Self {
            kind: UpstreamErrorKind::Status,
            message: format!("upstream returned {status}"),
            status: Some(status),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::decode(format!("Failed to decode response: {e}"))
        } else if e.is_builder() {
            Self::invalid_request(format!("Invalid request: {e}"))
        } else if let Some(status) = e.status() {
            Self::status(status)
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }
}

/// Error classification, used for logging and HTTP status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Connection refused, reset, proxy failure
    Network,
    /// Request deadline elapsed
    Timeout,
    /// Upstream answered with a non-2xx status
    Status,
    /// Response body did not have the expected shape
    Decode,
    /// Request could not be built (bad URL, bad content type)
    InvalidRequest,
}
