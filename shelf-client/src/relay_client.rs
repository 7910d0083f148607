//! Client for the recommendation stream relay.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use shelf_core::RecommendationQuery;

use crate::api::status_error;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

const STREAM_PATH: &str = "/api/stream-recommendations";

#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    relay_url: String,
}

impl RelayClient {
    /// No total timeout: the stream stays open for as long as the relay writes.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            relay_url: config.relay_url.trim_end_matches('/').to_string(),
        })
    }

    /// Start a recommendation stream. Chunks are yielded as the relay
    /// forwards them; a rejected request fails before any chunk.
    pub async fn recommend(&self, query: &str) -> ClientResult<BoxStream<'static, ClientResult<Bytes>>> {
        let url = format!("{}{}", self.relay_url, STREAM_PATH);
        let body = RecommendationQuery {
            query: query.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.bytes_stream().map_err(ClientError::from).boxed())
    }
}
