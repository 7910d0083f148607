//! Relay Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited
//! to local development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

/// Path of the upstream streaming endpoint, relative to `backend_url`.
pub const UPSTREAM_STREAM_PATH: &str = "/api/recommend/query/stream/";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bookstore backend base URL.
    pub backend_url: String,
    pub bind_host: String,
    pub port: u16,
    /// Number of recommendations requested upstream.
    pub top_k: u32,
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    /// Upstream connect timeout. The stream itself has no total timeout.
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            top_k: 5,
            cors_origins: Vec::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Create RelayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `BACKEND_API_URL`: Backend base URL (default: http://localhost:8000)
    /// - `SHELF_RELAY_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `SHELF_RELAY_PORT`: Listen port (default: 3000)
    /// - `SHELF_RELAY_TOP_K`: Recommendations per query (default: 5)
    /// - `SHELF_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SHELF_RELAY_CONNECT_TIMEOUT_SECS`: Upstream connect timeout (default: 10)
    pub fn from_env() -> RelayResult<Self> {
        let defaults = Self::default();

        let backend_url = std::env::var("BACKEND_API_URL").unwrap_or(defaults.backend_url);
        let bind_host = std::env::var("SHELF_RELAY_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("SHELF_RELAY_PORT").ok())
        {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| RelayError::startup(format!("Invalid port value: {}", value)))?,
            None => defaults.port,
        };

        let top_k = std::env::var("SHELF_RELAY_TOP_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.top_k);

        let cors_origins = std::env::var("SHELF_CORS_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let connect_timeout = std::env::var("SHELF_RELAY_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        Ok(Self {
            backend_url,
            bind_host,
            port,
            top_k,
            cors_origins,
            connect_timeout,
        })
    }

    pub fn bind_addr(&self) -> RelayResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            RelayError::startup(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Full URL of the upstream streaming endpoint.
    pub fn upstream_url(&self) -> String {
        format!(
            "{}{}",
            self.backend_url.trim_end_matches('/'),
            UPSTREAM_STREAM_PATH
        )
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
