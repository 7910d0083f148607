//! Error types for shelf domain values

use thiserror::Error;

/// Errors raised while decoding or validating domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Malformed session payload: {reason}")]
    MalformedSession { reason: String },
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
