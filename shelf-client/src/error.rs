//! Error types for the shelf client.

use shelf_cache::CacheError;
use shelf_core::CoreError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid session: {0}")]
    Session(#[from] CoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ClientError {
    /// HTTP status reported by the server, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A user action whose remote write failed. The optimistic change has
/// already been rolled back when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("Mutation on {key} failed: {source}")]
    Remote {
        key: String,
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl MutationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MutationError::Remote { source, .. } => source.status(),
            MutationError::Cache(_) => None,
        }
    }
}
