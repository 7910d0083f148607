use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use shelf_cache::OptimisticCache;
use shelf_client::{CartSource, ClientError, ClientResult, CartApi, MutationCoordinator};
use shelf_core::{CacheKey, CartAck, CartSnapshot, ProductId};
use shelf_test_utils::generators::{arb_cart_snapshot, arb_price, arb_product_id, arb_quantity};

/// Backend whose writes all succeed or all fail, and whose cart is fixed.
struct ScriptedCart {
    server: CartSnapshot,
    fail: bool,
}

impl ScriptedCart {
    fn ack(&self) -> ClientResult<CartAck> {
        if self.fail {
            return Err(ClientError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        Ok(CartAck {
            message: "ok".to_string(),
            cart_count: self.server.count,
        })
    }
}

#[async_trait]
impl CartApi for ScriptedCart {
    async fn get_cart(&self) -> ClientResult<CartSnapshot> {
        Ok(self.server.clone())
    }

    async fn add_to_cart(&self, _: ProductId, _: u32) -> ClientResult<CartAck> {
        self.ack()
    }

    async fn remove_from_cart(&self, _: ProductId) -> ClientResult<CartAck> {
        self.ack()
    }

    async fn update_quantity(&self, _: ProductId, _: u32) -> ClientResult<CartAck> {
        self.ack()
    }
}

#[derive(Debug, Clone)]
enum CartWrite {
    Add(ProductId, u32, Option<f64>),
    Remove(ProductId),
    Update(ProductId, u32),
}

fn arb_write() -> impl Strategy<Value = CartWrite> {
    prop_oneof![
        (arb_product_id(), arb_quantity(), proptest::option::of(arb_price()))
            .prop_map(|(id, q, p)| CartWrite::Add(id, q, p)),
        arb_product_id().prop_map(CartWrite::Remove),
        (arb_product_id(), arb_quantity()).prop_map(|(id, q)| CartWrite::Update(id, q)),
    ]
}

fn apply(write: &CartWrite, cart: CartSnapshot) -> CartSnapshot {
    match *write {
        CartWrite::Add(_, quantity, price) => cart.with_added(quantity, price),
        CartWrite::Remove(id) => cart.with_removed(id),
        CartWrite::Update(id, quantity) => cart.with_quantity(id, quantity),
    }
}

/// Run one mutation against a seeded cache and return the settled cart.
fn settle(seed: CartSnapshot, server: CartSnapshot, write: CartWrite, fail: bool) -> Option<CartSnapshot> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime builds");
    runtime.block_on(async move {
        let api = Arc::new(ScriptedCart { server, fail });
        let cache = Arc::new(OptimisticCache::with_defaults());
        cache.write(CacheKey::Cart, seed).ok();
        let coordinator =
            MutationCoordinator::with_refetch(cache.clone(), Arc::new(CartSource::new(api.clone())));

        let remote = async {
            match write {
                CartWrite::Add(id, quantity, _) => api.add_to_cart(id, quantity).await,
                CartWrite::Remove(id) => api.remove_from_cart(id).await,
                CartWrite::Update(id, quantity) => api.update_quantity(id, quantity).await,
            }
        };
        let transform_write = write.clone();
        let _ = coordinator
            .execute(CacheKey::Cart, move |cart| apply(&transform_write, cart), remote)
            .await;
        cache.read(&CacheKey::Cart).ok().flatten()
    })
}

proptest! {
    #[test]
    fn failed_write_leaves_cart_as_before(
        seed in arb_cart_snapshot(),
        server in arb_cart_snapshot(),
        write in arb_write(),
    ) {
        prop_assert_eq!(settle(seed.clone(), server, write, true), Some(seed));
    }

    #[test]
    fn successful_write_converges_to_server(
        seed in arb_cart_snapshot(),
        server in arb_cart_snapshot(),
        write in arb_write(),
    ) {
        prop_assert_eq!(settle(seed, server.clone(), write, false), Some(server));
    }

    #[test]
    fn optimistic_math_never_goes_negative(
        seed in arb_cart_snapshot(),
        writes in prop::collection::vec(arb_write(), 1..6),
    ) {
        let predicted = writes.iter().fold(seed, |cart, write| apply(write, cart));
        prop_assert!(predicted.total >= 0.0);
        prop_assert!(predicted.products.iter().all(|line| line.quantity > 0));
    }
}
