//! DEX fee indexer
//!
//! This crate keeps a long-lived connection to a DEX market-data websocket,
//! discovers and subscribes to market channels as they appear, normalizes
//! trade and executed-transaction records into fee events, and serves rolling
//! revenue figures and diagnostics over HTTP.

use std::sync::Arc;
use tokio::sync::RwLock;

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fees;
pub mod metrics;
pub mod parser;
pub mod subscription;
pub mod websocket;

pub use api::AccountResolver;
pub use config::Config;
pub use diagnostics::{ConnectionState, IndexerDebug};
pub use error::{IndexerError, Result};
pub use fees::{FeeEvent, FeeIndexer, FeeStore, RevenueSummary};
pub use metrics::FeedMetrics;
pub use parser::{Envelope, FeedFrame};
pub use subscription::{SubscribeRequest, SubscriptionTracker};
pub use websocket::WebSocketManager;

/// Application state shared across components
pub struct AppState {
    pub indexer: Arc<RwLock<FeeIndexer>>,
    pub metrics: Arc<FeedMetrics>,
    pub accounts: AccountResolver,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            indexer: Arc::new(RwLock::new(FeeIndexer::new(&config)?)),
            metrics: Arc::new(FeedMetrics::new()?),
            accounts: AccountResolver::new(&config.rest_endpoint),
            config: Arc::new(config),
        })
    }
}
