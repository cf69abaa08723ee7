//! Event-stream frame parser
//!
//! Splits an upstream event-stream body into lines and decodes the `data:`
//! lines into typed frames. Lines that are not data lines (comments,
//! `event:` lines, heartbeats) and data lines that do not decode are
//! skipped; only a failure to read the body ends the stream early.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::io::StreamReader;

pub const DATA_PREFIX: &str = "data:";
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// One decoded upstream event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum UpstreamFrame {
    /// Incremental answer text
    #[serde(rename = "message")]
    Message { answer: String, message_id: String },
    /// The answer is complete
    #[serde(rename = "message_end")]
    MessageEnd {
        #[serde(default)]
        message_id: Option<String>,
    },
    /// Any other event kind (workflow progress, ping, ...)
    #[serde(other)]
    Other,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("Read error: upstream line longer than {MAX_LINE_LENGTH} bytes")]
    LineTooLong,
}

impl From<AnyDelimiterCodecError> for FrameError {
    fn from(e: AnyDelimiterCodecError) -> Self {
        match e {
            AnyDelimiterCodecError::Io(io) => Self::Read(io),
            AnyDelimiterCodecError::MaxChunkLengthExceeded => Self::LineTooLong,
        }
    }
}

/// Decode one line of the event stream.
///
/// Returns `None` for blank lines, non-data lines and data lines whose
/// payload is not a recognizable JSON event.
pub fn parse_line(line: &str) -> Option<UpstreamFrame> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, payload = %payload, "Skipping unparseable event line");
            None
        }
    }
}

/// Turn a raw body into a stream of frames.
///
/// Lines are split on raw bytes and decoded lossily, so a line that is not
/// valid UTF-8 is treated like any other unparseable line. Ends normally
/// when the body ends. A read failure is yielded once as `Err` and then the
/// stream ends.
pub fn frames<S>(body: S) -> impl Stream<Item = Result<UpstreamFrame, FrameError>> + Send
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send,
{
    let lines = FramedRead::new(
        StreamReader::new(body),
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), MAX_LINE_LENGTH),
    );

    lines
        .filter_map(|line| async move {
            match line {
                Ok(line) => parse_line(&String::from_utf8_lossy(&line)).map(Ok),
                Err(e) => Some(Err(FrameError::from(e))),
            }
        })
        .scan(false, |failed, item| {
            let next = if *failed {
                None
            } else {
                *failed = item.is_err();
                Some(item)
            };
            futures::future::ready(next)
        })
}
