//! Error Types for the Stream Relay
//!
//! Every failure the relay reports is a [`RelayError`]: a classification,
//! the HTTP status sent to the client, and a message. They are serialized
//! as `{"error": message}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shelf_core::ErrorBody;
use std::fmt;

/// Why a relay call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upstream answered with a non-success status.
    Upstream,
    /// The upstream could not be reached or the request could not be sent.
    Transport,
    /// The client's request was unusable.
    InvalidRequest,
    /// The relay itself could not start: bad configuration, bind or
    /// subscriber failures. Never produced while serving a request.
    Startup,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Upstream => "upstream",
            ErrorKind::Transport => "transport",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Startup => "startup",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RelayError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// Upstream rejected the request. Its status is passed through.
    pub fn upstream(status: StatusCode, body: &str) -> Self {
        Self::new(
            ErrorKind::Upstream,
            status,
            format!("Backend returned {}: {}", status.as_u16(), body),
        )
    }

    /// No upstream response at all.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Transport,
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", err),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, StatusCode::BAD_REQUEST, message)
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Startup, StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
