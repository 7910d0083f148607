//! Shelf Test Utilities
//!
//! Shared test infrastructure for the shelf workspace:
//! - Proptest generators for cart and feedback types
//! - Fixtures for the common cart scenarios
//! - [`MockBackend`], an axum server standing in for the bookstore backend
//!   (cart, feedback, and the recommendation stream)

pub mod backend;

pub use backend::{CatalogItem, MockBackend, RecordedRequest};

// Re-export core types for convenience
pub use shelf_core::{
    BookId, CacheKey, CartLineItem, CartSnapshot, FeedbackState, ProductId, SessionUser,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for shelf domain types.

    use super::*;
    use proptest::prelude::*;

    /// Product ids from a small range so generated carts collide on lines.
    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        (1u64..20).prop_map(ProductId)
    }

    pub fn arb_book_id() -> impl Strategy<Value = BookId> {
        (1u64..500).prop_map(BookId)
    }

    /// Whole-cent prices between 0.50 and 99.99.
    pub fn arb_price() -> impl Strategy<Value = f64> {
        (50u32..10_000).prop_map(|cents| f64::from(cents) / 100.0)
    }

    pub fn arb_quantity() -> impl Strategy<Value = u32> {
        1u32..10
    }

    /// A line whose `line_total` matches its quantity and effective price.
    pub fn arb_line_item() -> impl Strategy<Value = CartLineItem> {
        (
            arb_product_id(),
            arb_price(),
            proptest::option::of(arb_price()),
            arb_quantity(),
        )
            .prop_map(|(product_id, unit_price, sale_price, quantity)| {
                let mut line = CartLineItem {
                    product_id,
                    name: format!("Book {}", product_id),
                    unit_price,
                    sale_price,
                    is_sale: sale_price.is_some(),
                    image: None,
                    quantity,
                    line_total: 0.0,
                };
                line.line_total = line.expected_total();
                line
            })
    }

    /// A server-consistent cart: one line per product, totals summed.
    pub fn arb_cart_snapshot() -> impl Strategy<Value = CartSnapshot> {
        prop::collection::vec(arb_line_item(), 0..6).prop_map(|lines| {
            let mut products: Vec<CartLineItem> = Vec::new();
            for line in lines {
                if products.iter().all(|l| l.product_id != line.product_id) {
                    products.push(line);
                }
            }
            fixtures::snapshot_of(products)
        })
    }

    pub fn arb_feedback_state() -> impl Strategy<Value = FeedbackState> {
        prop_oneof![
            Just(FeedbackState::None),
            Just(FeedbackState::Positive),
            Just(FeedbackState::Negative),
        ]
    }

    /// Search queries as typed into the recommendation box.
    pub fn arb_query() -> impl Strategy<Value = String> {
        "[a-z][a-z -]{0,24}"
    }

    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        prop_oneof![
            Just(CacheKey::Cart),
            (arb_book_id(), arb_query()).prop_map(|(book, query)| CacheKey::feedback(book, query)),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common testing scenarios.

    use super::*;

    /// Books the mock backend sells.
    pub fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new(1, "Dune", 10.0, None),
            CatalogItem::new(2, "Hyperion", 12.5, Some(9.0)),
            CatalogItem::new(3, "Neuromancer", 8.0, None),
            CatalogItem::new(4, "Solaris", 10.0, None),
            CatalogItem::new(5, "Foundation", 10.0, None),
        ]
    }

    /// Snapshot with `count` as the number of lines, the way the backend reports it.
    pub fn snapshot_of(products: Vec<CartLineItem>) -> CartSnapshot {
        CartSnapshot {
            total: products.iter().map(|line| line.line_total).sum(),
            count: products.len() as u32,
            products,
        }
    }

    /// Backend with Dune and Solaris in the cart: `{count: 2, total: 20}`.
    pub fn two_book_backend() -> MockBackend {
        let backend = MockBackend::with_catalog(catalog());
        backend.seed_line(1, 1);
        backend.seed_line(4, 1);
        backend
    }

    /// Two copies of Dune: `{count: 2, total: 20}` once counted by units.
    pub fn two_book_cart() -> CartSnapshot {
        CartSnapshot {
            products: vec![CatalogItem::new(1, "Dune", 10.0, None).line(2)],
            total: 20.0,
            count: 2,
        }
    }

    pub fn session_user() -> SessionUser {
        SessionUser {
            name: "Test Reader".to_string(),
            email: "reader@example.com".to_string(),
            id: "7".to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_generated_carts_are_consistent(cart in arb_cart_snapshot()) {
            prop_assert!(cart.validate().is_ok());
        }
    }

    #[test]
    fn test_two_book_cart_fixture() {
        let cart = fixtures::two_book_cart();
        assert_eq!(cart.count, 2);
        assert_eq!(cart.total, 20.0);
        assert!(cart.validate().is_ok());
    }
}
