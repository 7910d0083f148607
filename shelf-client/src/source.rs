//! Data sources the coordinator refetches from after a successful write.

use std::sync::Arc;

use async_trait::async_trait;
use shelf_core::CartSnapshot;

use crate::api::CartApi;
use crate::error::ClientResult;

/// Authoritative read of one cached value.
///
/// This abstracts over where the value lives so the coordinator can settle
/// any key the same way.
#[async_trait]
pub trait DataSource<V>: Send + Sync {
    /// Fetch the current server value.
    async fn fetch(&self) -> ClientResult<V>;
}

/// `GET /api/cart/`.
pub struct CartSource<A: ?Sized> {
    api: Arc<A>,
}

impl<A: CartApi + ?Sized> CartSource<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: CartApi + ?Sized> DataSource<CartSnapshot> for CartSource<A> {
    async fn fetch(&self) -> ClientResult<CartSnapshot> {
        self.api.get_cart().await
    }
}
