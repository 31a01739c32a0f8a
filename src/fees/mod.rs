//! Fee module
//!
//! Canonical fee events, the time-windowed store that holds them, and the
//! indexer state that ties parsing, subscriptions and diagnostics together.

mod aggregator;
mod indexer;
mod store;

pub use aggregator::{compute_24h_totals, RevenueSummary};
pub use indexer::{FeeIndexer, FrameOutcome};
pub use store::{FeeStore, RAW_TRADE_CAPACITY, RAW_TX_CAPACITY};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Events older than this are pruned
pub const RETENTION_MS: i64 = 48 * HOUR_MS;

/// Window used for revenue totals
pub const REVENUE_WINDOW_MS: i64 = 24 * HOUR_MS;

/// Current wall clock in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One maker/taker fee observation in display units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEvent {
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub maker_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub taker_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// `-1` when the source record named no market
    pub market_id: i64,
    pub tx_hash: String,
    pub trade_id: Option<String>,
}

/// Where a batch of fee records came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Trade,
    ExecutedTx,
}

/// Compact record of one ingested batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    pub kind: SampleKind,
    pub timestamp: i64,
    pub count: usize,
}
