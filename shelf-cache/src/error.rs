//! Error types for cache operations

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
