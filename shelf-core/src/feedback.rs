//! Thumbs up/down state for a recommended book.

use serde::{Deserialize, Serialize};

/// Client-side vote on a `(book, query)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackState {
    #[default]
    None,
    Positive,
    Negative,
}

impl FeedbackState {
    pub fn from_vote(is_positive: bool) -> Self {
        if is_positive {
            FeedbackState::Positive
        } else {
            FeedbackState::Negative
        }
    }

    /// The `is_positive` flag sent to the backend, if this is a vote at all.
    pub fn as_vote(&self) -> Option<bool> {
        match self {
            FeedbackState::None => None,
            FeedbackState::Positive => Some(true),
            FeedbackState::Negative => Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_round_trip() {
        assert_eq!(FeedbackState::from_vote(true).as_vote(), Some(true));
        assert_eq!(FeedbackState::from_vote(false).as_vote(), Some(false));
        assert_eq!(FeedbackState::default().as_vote(), None);
    }

    #[test]
    fn test_serialized_lowercase() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&FeedbackState::Positive)?, "\"positive\"");
        assert_eq!(serde_json::to_string(&FeedbackState::None)?, "\"none\"");
        Ok(())
    }
}
