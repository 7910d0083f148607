//! Logical cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::BookId;

/// Key of one cached server-derived value.
///
/// Displays as `cart` or `feedback:{book}:{query}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheKey {
    Cart,
    Feedback { book: BookId, query: String },
}

impl CacheKey {
    pub fn feedback(book: impl Into<BookId>, query: impl Into<String>) -> Self {
        CacheKey::Feedback {
            book: book.into(),
            query: query.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Cart => write!(f, "cart"),
            CacheKey::Feedback { book, query } => write!(f, "feedback:{}:{}", book, query),
        }
    }
}
