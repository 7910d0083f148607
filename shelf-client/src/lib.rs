//! Shelf Client
//!
//! Optimistic client for the bookstore backend. Cart and feedback writes are
//! applied to a local [`shelf_cache::OptimisticCache`] before the request
//! goes out, then reconciled with the server once it answers:
//!
//! - [`api`]: backend endpoints behind the [`CartApi`]/[`FeedbackApi`] traits
//! - [`coordinator`]: the four-phase mutation protocol
//! - [`storefront`]: cart and feedback state plus the user actions on it
//! - [`relay_client`]: recommendation streams from the relay

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod relay_client;
pub mod source;
pub mod storefront;

pub use api::{CartApi, FeedbackApi, RestClient};
pub use config::{ClientConfig, ConfigError};
pub use coordinator::{MutationCoordinator, MutationState, Settled, Settlement};
pub use error::{ClientError, ClientResult, MutationError};
pub use relay_client::RelayClient;
pub use source::{CartSource, DataSource};
pub use storefront::{FeedbackOutcome, Storefront};
