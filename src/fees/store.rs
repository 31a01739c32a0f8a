//! Time-windowed fee event store
//!
//! Canonical events are kept in arrival order, which is not necessarily
//! timestamp order, so pruning scans the whole buffer.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde_json::Value;

use super::{FeeEvent, RETENTION_MS};
use crate::parser::trade_to_fee_event;

/// Raw trade samples kept for the zero-fee-inclusive view
pub const RAW_TRADE_CAPACITY: usize = 2_000;
/// Raw executed-transaction samples kept for diagnostics
pub const RAW_TX_CAPACITY: usize = 200;

/// Append-only fee event buffer with raw sample rings
#[derive(Debug, Default)]
pub struct FeeStore {
    events: Vec<FeeEvent>,
    raw_trades: VecDeque<Value>,
    raw_txs: VecDeque<Value>,
}

impl FeeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event in arrival order
    pub fn append(&mut self, event: FeeEvent) {
        self.events.push(event);
    }

    /// Drop every event older than the retention window.
    ///
    /// Returns the number of events removed.
    pub fn prune(&mut self, now_ms: i64) -> usize {
        let cutoff = now_ms.saturating_sub(RETENTION_MS);
        let before = self.events.len();
        self.events.retain(|e| e.timestamp >= cutoff);
        before - self.events.len()
    }

    pub fn all(&self) -> &[FeeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn record_raw_trade(&mut self, trade: Value) {
        push_bounded(&mut self.raw_trades, trade, RAW_TRADE_CAPACITY);
    }

    pub fn record_raw_tx(&mut self, tx: Value) {
        push_bounded(&mut self.raw_txs, tx, RAW_TX_CAPACITY);
    }

    pub fn raw_trade_count(&self) -> usize {
        self.raw_trades.len()
    }

    pub fn raw_tx_count(&self) -> usize {
        self.raw_txs.len()
    }

    /// Rebuild events from the raw trade ring, zero-fee trades included.
    ///
    /// Zero-fee trades never reach the canonical buffer, so this view is
    /// recomputed on demand with the current divisor.
    pub fn all_including_zero_fee(&self, divisor: Decimal, now_ms: i64) -> Vec<FeeEvent> {
        self.raw_trades
            .iter()
            .filter(|t| t.is_object())
            .filter_map(|t| trade_to_fee_event(t, divisor, now_ms))
            .collect()
    }

    /// Clear canonical events and both raw rings
    pub fn clear(&mut self) {
        self.events.clear();
        self.raw_trades.clear();
        self.raw_txs.clear();
    }
}

fn push_bounded(ring: &mut VecDeque<Value>, item: Value, capacity: usize) {
    if ring.len() == capacity {
        ring.pop_front();
    }
    ring.push_back(item);
}
