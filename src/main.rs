//! DEX fee indexer service
//!
//! Runs the background fee indexer against the upstream market feed and
//! serves its state to the dashboard over HTTP.

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dex_fee_indexer::{api, AppState, Config, WebSocketManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting DEX fee indexer");

    let config = Config::load()?;
    info!(
        ws_endpoint = %config.ws_endpoint,
        fee_divisor = config.fee_divisor,
        blind_subscribe_count = config.blind_subscribe_count,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::new(config)?);

    let ws_manager = WebSocketManager::new(state.clone());
    ws_manager.start();

    api::serve(state).await
}
