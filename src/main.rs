//! Chat relay - streaming gateway in front of a hosted chat service
//!
//! Browser clients post chat turns here and read the answer back as a live
//! byte stream. The upstream credential never leaves this process.

mod api;
mod config;
mod conversations;
mod files;
mod history;
mod relay;
mod upstream;

use api::{create_router, AppState};
use axum::http::{header, HeaderValue, Method};
use config::RelayConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upstream::{HttpUpstream, LoggingUpstream};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = RelayConfig::from_env();
    if config.upstream.api_key.is_empty() {
        tracing::warn!("No upstream API key configured. Set UPSTREAM_API_KEY.");
    }
    tracing::info!(
        base_url = %config.upstream.base_url,
        proxy = config.upstream.proxy.is_some(),
        history_page_limit = config.history_page_limit,
        "Upstream configured"
    );

    let client = HttpUpstream::new(&config.upstream)?;
    let upstream = Arc::new(LoggingUpstream::new(Arc::new(client)));
    let state = AppState::new(upstream, config.history_page_limit);

    let app = create_router(state)
        .layer(cors_layer(config.allowed_origins.as_deref())?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Chat relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(
    allowed_origins: Option<&[String]>,
) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let Some(origins) = allowed_origins else {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    };

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ORIGIN])
        .allow_credentials(true))
}
