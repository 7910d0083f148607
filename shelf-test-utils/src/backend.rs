//! Mock bookstore backend.
//!
//! Serves the cart, feedback, and recommendation-stream endpoints from
//! in-memory state. Tests keep a clone of the [`MockBackend`] handle to
//! inject failures, hold writes open, and feed stream chunks one at a time.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures_util::StreamExt;
use shelf_core::{
    AddToCartRequest, CartAck, CartLineItem, CartSnapshot, ErrorBody, FeedbackRequest, ProductId,
    RemoveFromCartRequest, StreamQuery, UpdateQuantityRequest,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

/// A product the backend can put in a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: f64,
    pub sale_price: Option<f64>,
}

impl CatalogItem {
    pub fn new(id: u64, name: &str, price: f64, sale_price: Option<f64>) -> Self {
        Self {
            product_id: ProductId(id),
            name: name.to_string(),
            price,
            sale_price,
        }
    }

    /// Cart line for `quantity` units, priced the way the backend prices it.
    pub fn line(&self, quantity: u32) -> CartLineItem {
        let effective = self.sale_price.unwrap_or(self.price);
        CartLineItem {
            product_id: self.product_id,
            name: self.name.clone(),
            unit_price: self.price,
            sale_price: self.sale_price,
            is_sale: self.sale_price.is_some(),
            image: None,
            quantity,
            line_total: effective * f64::from(quantity),
        }
    }
}

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub cookie: Option<String>,
}

#[derive(Default)]
struct BackendState {
    catalog: HashMap<ProductId, CatalogItem>,
    lines: Vec<(ProductId, u32)>,
    write_failure: Option<(StatusCode, String)>,
    write_gate: Option<Arc<Notify>>,
    stream_failure: Option<(StatusCode, String)>,
    stream_chunks: Vec<String>,
    stream_feed: Option<mpsc::Receiver<Bytes>>,
    feedback: Vec<FeedbackRequest>,
    stream_queries: Vec<StreamQuery>,
    requests: Vec<RecordedRequest>,
}

/// Handle to a mock backend. Clones share state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let backend = Self::new();
        backend.lock().catalog = items
            .into_iter()
            .map(|item| (item.product_id, item))
            .collect();
        backend
    }

    /// Put a line in the cart without going through HTTP.
    pub fn seed_line(&self, product_id: u64, quantity: u32) {
        let mut state = self.lock();
        let id = ProductId(product_id);
        state.lines.retain(|(line, _)| *line != id);
        state.lines.push((id, quantity));
    }

    /// Make every cart and feedback write answer `status` with `{"error": message}`.
    pub fn fail_writes(&self, status: u16, message: &str) {
        self.lock().write_failure = Some((status_code(status), message.to_string()));
    }

    /// Undo [`fail_writes`](Self::fail_writes) and [`fail_stream`](Self::fail_stream).
    pub fn recover(&self) {
        let mut state = self.lock();
        state.write_failure = None;
        state.stream_failure = None;
    }

    /// Park every subsequent write until the returned handle is notified,
    /// once per write.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().write_gate = Some(gate.clone());
        gate
    }

    /// Make the stream endpoint answer `status` with a plain-text body.
    pub fn fail_stream(&self, status: u16, body: &str) {
        self.lock().stream_failure = Some((status_code(status), body.to_string()));
    }

    /// Chunks returned by the stream endpoint when no feed is installed.
    pub fn set_stream_chunks<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().stream_chunks = chunks.into_iter().map(Into::into).collect();
    }

    /// The next stream request is answered chunk by chunk from this sender.
    /// Dropping the sender ends the body.
    pub fn stream_feed(&self) -> mpsc::Sender<Bytes> {
        let (tx, rx) = mpsc::channel(16);
        self.lock().stream_feed = Some(rx);
        tx
    }

    /// Current cart, computed the way the backend computes it.
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.lock();
        let products: Vec<CartLineItem> = state
            .lines
            .iter()
            .filter_map(|(id, quantity)| state.catalog.get(id).map(|item| item.line(*quantity)))
            .collect();
        CartSnapshot {
            total: products.iter().map(|line| line.line_total).sum(),
            count: products.len() as u32,
            products,
        }
    }

    pub fn feedback(&self) -> Vec<FeedbackRequest> {
        self.lock().feedback.clone()
    }

    pub fn stream_queries(&self) -> Vec<StreamQuery> {
        self.lock().stream_queries.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/api/cart/",
                axum::routing::get(get_cart)
                    .post(add_to_cart)
                    .delete(remove_from_cart)
                    .patch(update_quantity),
            )
            .route("/api/recommend/feedback/", post(submit_feedback))
            .route("/api/recommend/query/stream/", post(stream_query))
            .layer(middleware::from_fn_with_state(self.clone(), record_request))
            .with_state(self.clone())
    }

    /// Serve on an ephemeral localhost port until the runtime shuts down.
    pub async fn spawn(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });
        Ok(addr)
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait on the write gate, then report the configured failure if any.
    async fn admit_write(&self) -> Result<(), Response> {
        let gate = self.lock().write_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.lock().write_failure.clone() {
            Some((status, message)) => Err(error_response(status, message)),
            None => Ok(()),
        }
    }

    fn ack(&self, message: &str) -> Json<CartAck> {
        Json(CartAck {
            message: message.to_string(),
            cart_count: self.lock().lines.len() as u32,
        })
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found.")
}

async fn record_request(State(backend): State<MockBackend>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        cookie: request
            .headers()
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };
    backend.lock().requests.push(recorded);
    next.run(request).await
}

async fn get_cart(State(backend): State<MockBackend>) -> Json<CartSnapshot> {
    Json(backend.snapshot())
}

async fn add_to_cart(
    State(backend): State<MockBackend>,
    Json(request): Json<AddToCartRequest>,
) -> Response {
    if let Err(response) = backend.admit_write().await {
        return response;
    }
    {
        let mut state = backend.lock();
        if !state.catalog.contains_key(&request.product_id) {
            return not_found();
        }
        let existing = state
            .lines
            .iter()
            .position(|(id, _)| *id == request.product_id);
        match existing {
            Some(index) => state.lines[index].1 += request.quantity,
            None => state.lines.push((request.product_id, request.quantity)),
        }
    }
    backend.ack("Product added to cart").into_response()
}

async fn remove_from_cart(
    State(backend): State<MockBackend>,
    Json(request): Json<RemoveFromCartRequest>,
) -> Response {
    if let Err(response) = backend.admit_write().await {
        return response;
    }
    {
        let mut state = backend.lock();
        if !state.catalog.contains_key(&request.product_id) {
            return not_found();
        }
        state.lines.retain(|(id, _)| *id != request.product_id);
    }
    backend.ack("Product removed from cart").into_response()
}

async fn update_quantity(
    State(backend): State<MockBackend>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Response {
    if let Err(response) = backend.admit_write().await {
        return response;
    }
    {
        let mut state = backend.lock();
        if !state.catalog.contains_key(&request.product_id) {
            return not_found();
        }
        if let Some((_, quantity)) = state
            .lines
            .iter_mut()
            .find(|(id, _)| *id == request.product_id)
        {
            *quantity = request.quantity;
        }
    }
    backend.ack("Cart updated").into_response()
}

async fn submit_feedback(
    State(backend): State<MockBackend>,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    if let Err(response) = backend.admit_write().await {
        return response;
    }
    backend.lock().feedback.push(request);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({"message": "Feedback recorded"})),
    )
        .into_response()
}

async fn stream_query(
    State(backend): State<MockBackend>,
    Json(query): Json<StreamQuery>,
) -> Response {
    let (failure, feed, chunks) = {
        let mut state = backend.lock();
        state.stream_queries.push(query);
        (
            state.stream_failure.clone(),
            state.stream_feed.take(),
            state.stream_chunks.clone(),
        )
    };

    if let Some((status, body)) = failure {
        return (status, body).into_response();
    }

    let body = match feed {
        Some(rx) => Body::from_stream(ReceiverStream::new(rx).map(Ok::<Bytes, Infallible>)),
        None => Body::from_stream(futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Bytes, Infallible>(Bytes::from(chunk))),
        )),
    };
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
