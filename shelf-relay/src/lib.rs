//! Shelf Relay
//!
//! A small HTTP service that accepts a recommendation query from the
//! browser, forwards it to the bookstore backend's streaming endpoint and
//! relays the text stream back unchanged.

pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod telemetry;

pub use config::RelayConfig;
pub use error::{ErrorKind, RelayError, RelayResult};
pub use relay::{StreamRelay, StreamSession};
pub use routes::create_router;

use std::sync::Arc;

use tokio::net::TcpListener;

/// Serve the relay on an already bound listener until a shutdown signal.
pub async fn serve(listener: TcpListener, config: &RelayConfig) -> RelayResult<()> {
    let relay = Arc::new(StreamRelay::new(config)?);
    let app = create_router(relay, config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::startup(format!("Server error: {}", e)))
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
