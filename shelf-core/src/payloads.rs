//! Request and response bodies exchanged with the backend and the relay.

use serde::{Deserialize, Serialize};

use crate::identity::{BookId, ProductId};

fn default_quantity() -> u32 {
    1
}

/// `POST /api/cart/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// `DELETE /api/cart/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// `PATCH /api/cart/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Acknowledgement returned by the cart write endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartAck {
    pub message: String,
    pub cart_count: u32,
}

/// `POST /api/recommend/feedback/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub book: BookId,
    #[serde(default)]
    pub query: String,
    pub is_positive: bool,
}

/// Body the relay sends upstream to `POST /api/recommend/query/stream/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamQuery {
    pub query: String,
    pub top_k: u32,
}

/// Body a browser sends to `POST /api/stream-recommendations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationQuery {
    pub query: String,
}

/// `{"error": "..."}`, the failure body used by both the backend and the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() -> Result<(), serde_json::Error> {
        let request: AddToCartRequest = serde_json::from_str(r#"{"product_id": 3}"#)?;
        assert_eq!(request.quantity, 1);
        Ok(())
    }

    #[test]
    fn test_feedback_wire_shape() -> Result<(), serde_json::Error> {
        let request = FeedbackRequest {
            book: BookId(7),
            query: "sci-fi".to_string(),
            is_positive: true,
        };
        let value = serde_json::to_value(&request)?;
        assert_eq!(
            value,
            serde_json::json!({"book": 7, "query": "sci-fi", "is_positive": true})
        );
        Ok(())
    }
}
