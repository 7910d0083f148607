//! Stream relay.
//!
//! One upstream request per call, no retries. A failed upstream response
//! is read in full and turned into a [`RelayError`] before anything is sent
//! downstream; a successful one is handed over as a [`StreamSession`] whose
//! body is forwarded chunk by chunk as it arrives.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{StreamExt, TryStreamExt};
use shelf_core::StreamQuery;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};

/// Forwards recommendation queries to the backend's streaming endpoint.
#[derive(Clone)]
pub struct StreamRelay {
    client: reqwest::Client,
    upstream_url: String,
    top_k: u32,
}

impl StreamRelay {
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::startup(format!("Failed to build upstream client: {}", e)))?;
        Ok(Self {
            client,
            upstream_url: config.upstream_url(),
            top_k: config.top_k,
        })
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Open an upstream stream for `query`.
    pub async fn relay(&self, query: String) -> RelayResult<StreamSession> {
        let request = StreamQuery {
            query,
            top_k: self.top_k,
        };
        info!(query = %request.query, target = %self.upstream_url, "Relaying recommendation stream");

        let response = self
            .client
            .post(&self.upstream_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Upstream request failed");
                RelayError::transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            error!(status = status.as_u16(), body = %body, "Upstream returned an error");
            let status = StatusCode::from_u16(status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(RelayError::upstream(status, &body));
        }

        info!(status = status.as_u16(), "Upstream accepted, streaming to client");
        Ok(StreamSession { request, response })
    }
}

/// Read as much of an error body as the upstream sends. A body cut off
/// midway still belongs to an upstream rejection, so what arrived is kept.
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => body.extend_from_slice(&bytes),
            Err(e) => {
                warn!(error = %e, read = body.len(), "Upstream error body ended early");
                break;
            }
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// A live upstream response waiting to be forwarded.
///
/// Dropping it (for example when the client disconnects) closes the
/// upstream connection.
pub struct StreamSession {
    request: StreamQuery,
    response: reqwest::Response,
}

impl StreamSession {
    pub fn request(&self) -> &StreamQuery {
        &self.request
    }
}

impl IntoResponse for StreamSession {
    fn into_response(self) -> Response {
        let query = self.request.query;
        let chunks = self.response.bytes_stream().inspect_err(move |e| {
            // Status is already sent; the body just ends early.
            warn!(query = %query, error = %e, "Upstream stream broke mid-response");
        });

        let mut response = Response::new(Body::from_stream(chunks));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        response
    }
}
