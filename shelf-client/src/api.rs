//! Backend API: the traits the coordinator talks to and their REST implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shelf_core::{
    AddToCartRequest, CartAck, CartSnapshot, ErrorBody, FeedbackRequest, ProductId,
    RemoveFromCartRequest, SessionUser, UpdateQuantityRequest,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

const CART_PATH: &str = "/api/cart/";
const FEEDBACK_PATH: &str = "/api/recommend/feedback/";

/// Cart endpoints of the backend.
#[async_trait]
pub trait CartApi: Send + Sync {
    async fn get_cart(&self) -> ClientResult<CartSnapshot>;
    async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> ClientResult<CartAck>;
    async fn remove_from_cart(&self, product_id: ProductId) -> ClientResult<CartAck>;
    async fn update_quantity(&self, product_id: ProductId, quantity: u32) -> ClientResult<CartAck>;
}

/// Recommendation feedback endpoint. Write-only; there is nothing to read back.
#[async_trait]
pub trait FeedbackApi: Send + Sync {
    async fn submit_feedback(&self, request: &FeedbackRequest) -> ClientResult<()>;
}

/// reqwest client for the bookstore backend.
///
/// Every request carries the session cookie when one is configured.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    session_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let session_header = build_session_headers(config.session.as_ref())?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(url)
            .headers(self.session_header.clone())
            .send()
            .await?;
        parse_response(response).await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, path, "Sending backend write");
        let response = self
            .client
            .request(method, url)
            .headers(self.session_header.clone())
            .json(body)
            .send()
            .await?;
        parse_response(response).await
    }
}

#[async_trait]
impl CartApi for RestClient {
    async fn get_cart(&self) -> ClientResult<CartSnapshot> {
        self.get_json(CART_PATH).await
    }

    async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> ClientResult<CartAck> {
        let body = AddToCartRequest {
            product_id,
            quantity,
        };
        self.send_json(Method::POST, CART_PATH, &body).await
    }

    async fn remove_from_cart(&self, product_id: ProductId) -> ClientResult<CartAck> {
        let body = RemoveFromCartRequest { product_id };
        self.send_json(Method::DELETE, CART_PATH, &body).await
    }

    async fn update_quantity(&self, product_id: ProductId, quantity: u32) -> ClientResult<CartAck> {
        let body = UpdateQuantityRequest {
            product_id,
            quantity,
        };
        self.send_json(Method::PATCH, CART_PATH, &body).await
    }
}

#[async_trait]
impl FeedbackApi for RestClient {
    async fn submit_feedback(&self, request: &FeedbackRequest) -> ClientResult<()> {
        let _: serde_json::Value = self.send_json(Method::POST, FEEDBACK_PATH, request).await?;
        Ok(())
    }
}

/// Decode a success body, or turn a failure into [`ClientError::Status`].
pub(crate) async fn parse_response<T>(response: reqwest::Response) -> ClientResult<T>
where
    T: DeserializeOwned,
{
    if response.status().is_success() {
        return Ok(response.json::<T>().await?);
    }
    Err(status_error(response).await)
}

/// Failure response as [`ClientError::Status`].
///
/// The backend and the relay report failures as `{"error": "..."}`; that
/// message is kept when present, otherwise the raw body text is.
pub(crate) async fn status_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => return ClientError::Http(err),
    };
    let body = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(error) => error.error,
        Err(_) => text,
    };
    ClientError::Status { status, body }
}

fn build_session_headers(session: Option<&SessionUser>) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(user) = session {
        let value = HeaderValue::from_str(&user.cookie_pair()?).map_err(|e| {
            ClientError::Config(crate::config::ConfigError::InvalidValue {
                field: "session",
                reason: e.to_string(),
            })
        })?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_test_utils::fixtures;

    fn config(session: Option<SessionUser>) -> ClientConfig {
        ClientConfig {
            api_base_url: "http://localhost:8000/".to_string(),
            relay_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 1_000,
            session,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() -> ClientResult<()> {
        let client = RestClient::new(&config(None))?;
        assert_eq!(client.base_url(), "http://localhost:8000");
        Ok(())
    }

    #[test]
    fn test_session_cookie_header() -> ClientResult<()> {
        let headers = build_session_headers(Some(&fixtures::session_user()))?;
        let cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("session=%7B"));

        assert!(build_session_headers(None)?.is_empty());
        Ok(())
    }
}
