//! HTTP API for the chat relay

mod handlers;
mod stream;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::upstream::UpstreamApi;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn UpstreamApi>,
    /// Page size for history reconstruction
    pub history_page_limit: u32,
}

impl AppState {
    pub fn new(upstream: Arc<dyn UpstreamApi>, history_page_limit: u32) -> Self {
        Self {
            upstream,
            history_page_limit,
        }
    }
}
