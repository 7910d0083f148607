//! Shelf Core - Domain Types
//!
//! Plain data shared by every other crate: cart snapshots, feedback state,
//! cache keys, backend wire payloads, and the session cookie format.
//! Nothing here performs I/O.

pub mod cart;
pub mod error;
pub mod feedback;
pub mod identity;
pub mod key;
pub mod payloads;
pub mod session;

pub use cart::{CartLineItem, CartSnapshot};
pub use error::{CoreError, CoreResult};
pub use feedback::FeedbackState;
pub use identity::{BookId, ProductId};
pub use key::CacheKey;
pub use payloads::{
    AddToCartRequest, CartAck, ErrorBody, FeedbackRequest, RecommendationQuery,
    RemoveFromCartRequest, StreamQuery, UpdateQuantityRequest,
};
pub use session::SessionUser;
