//! Token and webhook relay entry point.

use std::sync::Arc;

use roomtap::config::RelayConfig;
use roomtap::relay::{create_router, RelayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env();
    log::info!(
        "Relay: LiveKit at {}, egress target {}",
        config.livekit_url,
        config.websocket_server_url
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    log::info!("Relay: listening on {}", listener.local_addr()?);

    let state = Arc::new(RelayState::new(config));
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Relay: failed to listen for ctrl-c: {}", e);
        return;
    }
    log::info!("Relay: shutting down");
}
