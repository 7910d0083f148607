//! HTTP routes for the relay.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::{StreamRelay, StreamSession};

/// Public path of the streaming endpoint.
pub const STREAM_PATH: &str = "/api/stream-recommendations";

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/stream-recommendations
///
/// Body: `{"query": "..."}`. The response body is the upstream's text
/// stream, or `{"error": "..."}` with a non-2xx status.
pub async fn stream_recommendations(
    State(relay): State<Arc<StreamRelay>>,
    body: Bytes,
) -> Result<StreamSession, RelayError> {
    let query = extract_query(&body)?;
    relay.relay(query).await
}

/// GET /health/ping
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

fn extract_query(body: &[u8]) -> Result<String, RelayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::invalid_request(format!("Invalid request body: {}", e)))?;

    match value.get("query").and_then(|q| q.as_str()) {
        Some(query) if !query.is_empty() => Ok(query.to_string()),
        _ => Err(RelayError::invalid_request("query is required")),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

fn build_cors_layer(config: &RelayConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Build the relay router.
pub fn create_router(relay: Arc<StreamRelay>, config: &RelayConfig) -> Router {
    Router::new()
        .route(STREAM_PATH, post(stream_recommendations))
        .route("/health/ping", get(ping))
        .with_state(relay)
        .layer(build_cors_layer(config))
        .layer(TraceLayer::new_for_http())
}
