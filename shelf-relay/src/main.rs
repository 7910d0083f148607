//! Shelf Relay Server

use shelf_relay::{telemetry::init_tracing, RelayConfig, RelayError, RelayResult};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> RelayResult<()> {
    init_tracing()?;

    let config = RelayConfig::from_env()?;
    let addr = config.bind_addr()?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::startup(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(
        %addr,
        upstream = %config.upstream_url(),
        top_k = config.top_k,
        "Shelf relay listening"
    );

    shelf_relay::serve(listener, &config).await?;

    tracing::info!("Shelf relay stopped");
    Ok(())
}
