//! Incremental response body for relayed chat turns
//!
//! Headers go out as soon as the handler returns, before the upstream has
//! produced anything, and each relay chunk is written as soon as it arrives.

use crate::relay::RelayChunk;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;

/// Build a streamed response from relay output
pub fn relay_response(
    chunks: impl Stream<Item = RelayChunk> + Send + 'static,
) -> Result<Response<Body>, StatusCode> {
    let body = Body::from_stream(chunks.map(|chunk| Ok::<_, Infallible>(chunk.into_bytes())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
        .body(body)
        .map_err(|e| {
            tracing::error!(error = ?e, "Failed to build relay response");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
