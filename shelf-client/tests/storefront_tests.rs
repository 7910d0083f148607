use std::sync::Arc;
use std::time::Duration;

use shelf_cache::ChangeKind;
use shelf_client::{
    ClientConfig, FeedbackOutcome, MutationError, RestClient, Storefront,
};
use shelf_core::{BookId, FeedbackState, ProductId};
use shelf_test_utils::{fixtures, MockBackend};

type Store = Storefront<RestClient>;

async fn connect(backend: &MockBackend) -> Arc<Store> {
    let addr = backend.spawn().await.expect("mock backend binds");
    let config = ClientConfig {
        api_base_url: format!("http://{}", addr),
        relay_url: "http://127.0.0.1:9".to_string(),
        request_timeout_ms: 5_000,
        session: Some(fixtures::session_user()),
    };
    let client = RestClient::new(&config).expect("client builds");
    Arc::new(Storefront::new(Arc::new(client)))
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

fn count_and_total(store: &Store) -> Option<(u32, f64)> {
    store
        .cart()
        .expect("cart readable")
        .map(|cart| (cart.count, cart.total))
}

#[tokio::test]
async fn add_to_cart_failure_restores_previous_cart() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.load_cart().await.expect("initial load");
    assert_eq!(count_and_total(&store), Some((2, 20.0)));

    backend.fail_writes(500, "database unavailable");
    let gate = backend.hold_writes();
    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.add_to_cart(ProductId(5), 1, Some(10.0)).await })
    };

    wait_until(|| count_and_total(&store) == Some((3, 30.0))).await;
    gate.notify_one();

    let result = task.await.expect("task joins");
    match result {
        Err(MutationError::Remote { source, .. }) => {
            assert_eq!(source.status(), Some(500));
            assert!(source.to_string().contains("database unavailable"));
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
    assert_eq!(count_and_total(&store), Some((2, 20.0)));
    assert!(store.cart_is_stale().expect("stale flag"));
}

#[tokio::test]
async fn add_to_cart_success_converges_to_server_cart() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.load_cart().await.expect("initial load");

    // Unit math says 4 books; the backend counts distinct lines
    let ack = store
        .add_to_cart(ProductId(5), 2, Some(10.0))
        .await
        .expect("add succeeds");
    assert_eq!(ack.cart_count, 3);

    let cart = store.cart().expect("cart readable").expect("cart present");
    assert_eq!(cart, backend.snapshot());
    assert_eq!((cart.count, cart.total), (3, 40.0));
    assert!(cart.line(ProductId(5)).is_some());
}

#[tokio::test]
async fn remove_and_update_settle_by_refetch() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.load_cart().await.expect("initial load");

    store
        .update_quantity(ProductId(1), 3)
        .await
        .expect("update succeeds");
    let cart = store.cart().expect("cart readable").expect("cart present");
    assert_eq!(cart.line(ProductId(1)).map(|l| l.quantity), Some(3));
    assert_eq!(cart.total, 40.0);

    store
        .remove_from_cart(ProductId(4))
        .await
        .expect("remove succeeds");
    let cart = store.cart().expect("cart readable").expect("cart present");
    assert!(cart.line(ProductId(4)).is_none());
    assert_eq!(cart, backend.snapshot());
}

#[tokio::test]
async fn every_request_carries_session_cookie() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.load_cart().await.expect("initial load");
    store
        .add_to_cart(ProductId(2), 1, Some(9.0))
        .await
        .expect("add succeeds");
    store
        .vote(BookId(7), "sci-fi", true)
        .await
        .expect("vote succeeds");

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    for request in requests {
        let cookie = request.cookie.unwrap_or_default();
        assert!(cookie.starts_with("session="), "{} {}", request.method, request.path);
    }
}

#[tokio::test]
async fn thumbs_up_is_immediate_and_survives_success() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    assert_eq!(
        store.feedback(BookId(7), "sci-fi").expect("readable"),
        FeedbackState::None
    );

    let gate = backend.hold_writes();
    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.vote(BookId(7), "sci-fi", true).await })
    };
    wait_until(|| store.feedback(BookId(7), "sci-fi").ok() == Some(FeedbackState::Positive)).await;

    // A second click while the first is pending is ignored
    let busy = store.vote(BookId(7), "sci-fi", false).await.expect("busy");
    assert_eq!(busy, FeedbackOutcome::Busy);

    gate.notify_one();
    let outcome = task.await.expect("task joins").expect("vote succeeds");
    assert_eq!(outcome, FeedbackOutcome::Recorded(FeedbackState::Positive));
    assert_eq!(
        store.feedback(BookId(7), "sci-fi").expect("readable"),
        FeedbackState::Positive
    );

    let recorded = backend.feedback();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].book, BookId(7));
    assert_eq!(recorded[0].query, "sci-fi");
    assert!(recorded[0].is_positive);
}

#[tokio::test]
async fn repeated_vote_sends_nothing() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.vote(BookId(3), "", false).await.expect("vote succeeds");
    let again = store.vote(BookId(3), "", false).await.expect("no-op");
    assert_eq!(again, FeedbackOutcome::Unchanged);
    assert_eq!(backend.feedback().len(), 1);
}

#[tokio::test]
async fn failed_vote_rolls_back_to_previous_state() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    store.vote(BookId(3), "space", true).await.expect("vote succeeds");

    backend.fail_writes(503, "feedback disabled");
    let result = store.vote(BookId(3), "space", false).await;
    assert!(matches!(result, Err(MutationError::Remote { .. })));
    assert_eq!(
        store.feedback(BookId(3), "space").expect("readable"),
        FeedbackState::Positive
    );
    // Other queries for the same book are separate keys
    assert_eq!(
        store.feedback(BookId(3), "other").expect("readable"),
        FeedbackState::None
    );
}

#[tokio::test]
async fn cart_subscribers_see_optimistic_then_refetched() {
    let backend = fixtures::two_book_backend();
    let store = connect(&backend).await;
    let mut events = store.subscribe_cart();
    store.load_cart().await.expect("initial load");
    store
        .add_to_cart(ProductId(3), 1, Some(8.0))
        .await
        .expect("add succeeds");

    backend.fail_writes(500, "nope");
    store
        .add_to_cart(ProductId(2), 1, None)
        .await
        .expect_err("add fails");

    let kinds: Vec<ChangeKind> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::Refetched,
            ChangeKind::Optimistic,
            ChangeKind::Refetched,
            ChangeKind::Optimistic,
            ChangeKind::RolledBack,
            ChangeKind::Invalidated,
        ]
    );
}

#[tokio::test]
async fn badge_tracks_cart_count() {
    let backend = MockBackend::with_catalog(fixtures::catalog());
    let store = connect(&backend).await;
    store.load_cart().await.expect("initial load");
    assert_eq!(store.badge().expect("badge"), None);

    store
        .add_to_cart(ProductId(1), 1, Some(10.0))
        .await
        .expect("add succeeds");
    assert_eq!(store.badge().expect("badge").as_deref(), Some("1"));
}
