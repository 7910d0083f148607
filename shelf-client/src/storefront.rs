//! Storefront: the cart and feedback state a UI renders, with every user
//! action routed through a [`MutationCoordinator`].

use std::sync::Arc;

use shelf_cache::{CacheEvent, OptimisticCache, RefetchOutcome};
use shelf_core::{BookId, CacheKey, CartAck, CartSnapshot, FeedbackRequest, FeedbackState, ProductId};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::api::{CartApi, FeedbackApi};
use crate::coordinator::{refetch, MutationCoordinator};
use crate::error::{ClientResult, MutationError};
use crate::source::{CartSource, DataSource};

pub type CartCache = OptimisticCache<CacheKey, CartSnapshot>;
pub type FeedbackCache = OptimisticCache<CacheKey, FeedbackState>;

/// What a feedback click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// The vote was sent and accepted.
    Recorded(FeedbackState),
    /// The vote was already the active one; nothing was sent.
    Unchanged,
    /// A vote for the same book and query is still in flight.
    Busy,
}

pub struct Storefront<A> {
    api: Arc<A>,
    cart_source: Arc<dyn DataSource<CartSnapshot>>,
    cart: MutationCoordinator<CacheKey, CartSnapshot>,
    feedback: MutationCoordinator<CacheKey, FeedbackState>,
}

impl<A> Storefront<A>
where
    A: CartApi + FeedbackApi + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        let cart_source: Arc<dyn DataSource<CartSnapshot>> = Arc::new(CartSource::new(api.clone()));
        let cart_cache = Arc::new(CartCache::with_defaults());
        let feedback_cache = Arc::new(FeedbackCache::with_defaults());
        Self {
            api,
            cart: MutationCoordinator::with_refetch(cart_cache, cart_source.clone()),
            feedback: MutationCoordinator::with_confirm(feedback_cache),
            cart_source,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Latest local cart, optimistic or confirmed.
    pub fn cart(&self) -> ClientResult<Option<CartSnapshot>> {
        Ok(self.cart.cache().read(&CacheKey::Cart)?)
    }

    /// Navbar badge for the current cart.
    pub fn badge(&self) -> ClientResult<Option<String>> {
        Ok(self.cart()?.and_then(|cart| cart.badge()))
    }

    /// Whether the cart is missing or was invalidated and should be refreshed.
    pub fn cart_is_stale(&self) -> ClientResult<bool> {
        Ok(self.cart.cache().is_stale(&CacheKey::Cart)?)
    }

    /// Fetch the cart from the backend. A mutation that starts meanwhile wins.
    pub async fn refresh_cart(&self) -> ClientResult<RefetchOutcome> {
        refetch(self.cart.cache(), &CacheKey::Cart, self.cart_source.as_ref()).await
    }

    /// The cart, refreshed first if it is stale.
    pub async fn load_cart(&self) -> ClientResult<Option<CartSnapshot>> {
        if self.cart_is_stale()? {
            let outcome = self.refresh_cart().await?;
            debug!(applied = outcome.is_applied(), "Loaded cart");
        }
        self.cart()
    }

    /// Add `quantity` units. `unit_price` feeds the optimistic total; without
    /// it only the count moves until the refetch lands.
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Option<f64>,
    ) -> Result<CartAck, MutationError> {
        let settled = self
            .cart
            .execute(
                CacheKey::Cart,
                move |cart| cart.with_added(quantity, unit_price),
                self.api.add_to_cart(product_id, quantity),
            )
            .await?;
        info!(product_id = %product_id, quantity, cart_count = settled.response.cart_count, "Added to cart");
        Ok(settled.response)
    }

    pub async fn remove_from_cart(&self, product_id: ProductId) -> Result<CartAck, MutationError> {
        let settled = self
            .cart
            .execute(
                CacheKey::Cart,
                move |cart| cart.with_removed(product_id),
                self.api.remove_from_cart(product_id),
            )
            .await?;
        info!(product_id = %product_id, cart_count = settled.response.cart_count, "Removed from cart");
        Ok(settled.response)
    }

    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartAck, MutationError> {
        let settled = self
            .cart
            .execute(
                CacheKey::Cart,
                move |cart| cart.with_quantity(product_id, quantity),
                self.api.update_quantity(product_id, quantity),
            )
            .await?;
        info!(product_id = %product_id, quantity, "Updated cart quantity");
        Ok(settled.response)
    }

    /// Current vote for a book under a search query.
    pub fn feedback(&self, book: BookId, query: &str) -> ClientResult<FeedbackState> {
        let key = CacheKey::feedback(book, query);
        Ok(self.feedback.cache().read(&key)?.unwrap_or_default())
    }

    /// Thumbs up (`true`) or down (`false`).
    pub async fn vote(
        &self,
        book: BookId,
        query: &str,
        is_positive: bool,
    ) -> Result<FeedbackOutcome, MutationError> {
        let key = CacheKey::feedback(book, query);
        let status = FeedbackState::from_vote(is_positive);
        if self.feedback.is_pending(&key) {
            return Ok(FeedbackOutcome::Busy);
        }
        if self.feedback.cache().read(&key)?.unwrap_or_default() == status {
            return Ok(FeedbackOutcome::Unchanged);
        }

        let request = FeedbackRequest {
            book,
            query: query.to_string(),
            is_positive,
        };
        let settled = self
            .feedback
            .execute_exclusive(key, move |_| status, async {
                self.api.submit_feedback(&request).await
            })
            .await?;
        Ok(match settled {
            Some(_) => {
                info!(book = %book, query, status = ?status, "Recorded feedback");
                FeedbackOutcome::Recorded(status)
            }
            None => FeedbackOutcome::Busy,
        })
    }

    /// Change notifications for the cart.
    pub fn subscribe_cart(&self) -> broadcast::Receiver<CacheEvent<CacheKey>> {
        self.cart.cache().subscribe()
    }

    /// Change notifications for every feedback key.
    pub fn subscribe_feedback(&self) -> broadcast::Receiver<CacheEvent<CacheKey>> {
        self.feedback.cache().subscribe()
    }
}
