//! Fee indexer state
//!
//! Owns everything the feed mutates: the event store, subscription sets,
//! counters and the fee divisor. The connection supervisor drives it frame by
//! frame; the HTTP layer reads it through the same lock.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, info, trace};

use super::{compute_24h_totals, FeeEvent, FeeStore, RevenueSummary, SampleKind};
use crate::config::Config;
use crate::diagnostics::{ConnectionState, FeedCounters, IndexerDebug};
use crate::error::{IndexerError, Result};
use crate::parser::{
    discovered_market_ids, fee_event_from_executed_tx, fee_event_from_trade, Envelope, FeedFrame,
};
use crate::subscription::{SubscribeRequest, SubscriptionTracker};

/// What a single inbound frame produced
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// Subscriptions for newly discovered markets
    pub subscribe: Vec<SubscribeRequest>,
    /// Fee events appended to the store
    pub fee_events: usize,
}

#[derive(Debug)]
pub struct FeeIndexer {
    ws_url: String,
    divisor: Decimal,
    store: FeeStore,
    subscriptions: SubscriptionTracker,
    counters: FeedCounters,
}

impl FeeIndexer {
    /// Create an indexer from configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            ws_url: config.ws_endpoint.clone(),
            divisor: parse_divisor(config.fee_divisor)?,
            store: FeeStore::new(),
            subscriptions: SubscriptionTracker::new(config.blind_subscribe_count),
            counters: FeedCounters::default(),
        })
    }

    pub fn fee_divisor(&self) -> Decimal {
        self.divisor
    }

    /// Replace the divisor used for all subsequent extraction.
    ///
    /// Non-positive or non-finite values are rejected and the current divisor
    /// is kept.
    pub fn set_fee_divisor(&mut self, value: f64) -> Result<()> {
        let divisor = parse_divisor(value)?;
        info!(old = %self.divisor, new = %divisor, "Fee divisor updated");
        self.divisor = divisor;
        Ok(())
    }

    /// Process one text frame from the feed
    pub fn handle_message(&mut self, raw: &str, now_ms: i64) -> FrameOutcome {
        self.counters.messages_seen += 1;
        self.counters.touch(now_ms);

        let mut outcome = FrameOutcome::default();

        let Some(envelope) = Envelope::parse(raw) else {
            self.counters.dropped_frames += 1;
            trace!(len = raw.len(), "Dropping malformed frame");
            return outcome;
        };
        self.counters.record_type(&envelope.kind);

        match envelope.frame {
            FeedFrame::MarketStats(frame) => {
                for market_id in discovered_market_ids(&frame) {
                    if let Some(request) = self.subscriptions.ensure_subscribed(market_id) {
                        debug!(market_id, "Discovered market");
                        outcome.subscribe.push(request);
                    }
                }
            }
            FeedFrame::Trades(trades) => {
                let count = trades.len();
                for trade in trades {
                    if !trade.is_object() {
                        continue;
                    }
                    if let Some(event) = fee_event_from_trade(&trade, self.divisor, now_ms) {
                        self.store.append(event);
                        outcome.fee_events += 1;
                    }
                    self.store.record_raw_trade(trade);
                }
                self.finish_batch(SampleKind::Trade, count, now_ms);
            }
            FeedFrame::ExecutedTransactions(txs) => {
                let count = txs.len();
                for tx in txs {
                    if !tx.is_object() {
                        continue;
                    }
                    if let Some(event) = fee_event_from_executed_tx(&tx, self.divisor, now_ms) {
                        self.store.append(event);
                        outcome.fee_events += 1;
                    }
                    self.store.record_raw_tx(tx);
                }
                self.finish_batch(SampleKind::ExecutedTx, count, now_ms);
            }
            FeedFrame::Transactions(count) => {
                trace!(count, "Transaction update");
            }
            FeedFrame::Other => {}
        }

        outcome
    }

    fn finish_batch(&mut self, kind: SampleKind, count: usize, now_ms: i64) {
        if count > 0 {
            self.counters.record_sample(kind, count, now_ms);
        }
        self.store.prune(now_ms);
    }

    /// Pings, pongs and other non-data frames still prove the link is alive
    pub fn record_keepalive(&mut self, now_ms: i64) {
        self.counters.touch(now_ms);
    }

    pub fn on_connecting(&mut self) {
        self.counters.connection_state = ConnectionState::Connecting;
    }

    /// A new connection is open: forget the previous live set and return
    /// every subscription to send, in order
    pub fn on_connected(&mut self) -> Vec<SubscribeRequest> {
        self.counters.connection_state = ConnectionState::Connected;
        self.counters.connections_opened += 1;
        self.subscriptions.reset_live();
        self.subscriptions.resubscribe_all()
    }

    pub fn on_disconnected(&mut self, stale: bool) {
        if self.counters.connection_state == ConnectionState::Connected {
            self.counters.connections_closed += 1;
        }
        if stale {
            self.counters.stale_disconnects += 1;
        }
        self.counters.connection_state = ConnectionState::Disconnected;
        self.subscriptions.reset_live();
    }

    /// Periodic housekeeping: prune and log a status line.
    ///
    /// Returns the number of expired events removed.
    pub fn tick(&mut self, now_ms: i64) -> usize {
        let pruned = self.store.prune(now_ms);
        info!(
            state = ?self.counters.connection_state,
            messages = self.counters.messages_seen,
            stored_events = self.store.len(),
            pruned,
            live_markets = self.subscriptions.live().len(),
            desired_markets = self.subscriptions.desired().len(),
            "Fee indexer status"
        );
        pruned
    }

    /// Stored events, or the zero-fee-inclusive view rebuilt from raw trades
    pub fn fee_events(&mut self, include_zero: bool, now_ms: i64) -> Vec<FeeEvent> {
        self.store.prune(now_ms);
        if include_zero {
            self.store.all_including_zero_fee(self.divisor, now_ms)
        } else {
            self.store.all().to_vec()
        }
    }

    pub fn revenue_24h(&mut self, now_ms: i64) -> RevenueSummary {
        compute_24h_totals(&mut self.store, now_ms)
    }

    /// Diagnostic snapshot; expired events are pruned first so the stored
    /// count matches the retention window
    pub fn debug_snapshot(&mut self, now_ms: i64) -> IndexerDebug {
        self.store.prune(now_ms);
        let counters = &self.counters;
        IndexerDebug {
            ws_url: self.ws_url.clone(),
            fee_divisor: self.divisor.to_f64().unwrap_or_default(),
            connection_state: counters.connection_state,
            connections_opened: counters.connections_opened,
            connections_closed: counters.connections_closed,
            stale_disconnects: counters.stale_disconnects,
            messages_seen: counters.messages_seen,
            dropped_frames: counters.dropped_frames,
            trade_events: counters.trade_events,
            executed_tx_events: counters.executed_tx_events,
            type_counts: counters.type_counts.clone(),
            desired_markets: self.subscriptions.desired().iter().copied().collect(),
            live_markets: self.subscriptions.live().iter().copied().collect(),
            blind_subscribe_count: self.subscriptions.blind_range(),
            recent_types: counters.recent_types(),
            recent_samples: counters.recent_samples(),
            last_message_at: counters.last_message_at,
            stored_events: self.store.len(),
            raw_trades: self.store.raw_trade_count(),
            raw_txs: self.store.raw_tx_count(),
        }
    }

    /// Clear buffers and counters; the connection and subscriptions are kept
    pub fn reset(&mut self) {
        self.store.clear();
        self.counters.reset();
        info!("Fee indexer reset");
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.counters.connection_state
    }

    pub fn live_market_count(&self) -> usize {
        self.subscriptions.live().len()
    }
}

/// Smallest positive value a `Decimal` can hold
const MIN_DIVISOR: f64 = 1e-28;

fn parse_divisor(value: f64) -> Result<Decimal> {
    if !value.is_finite() || value <= 0.0 {
        return Err(IndexerError::InvalidDivisor(format!(
            "{} is not a positive finite number",
            value
        )));
    }
    if value < MIN_DIVISOR {
        return Err(IndexerError::InvalidDivisor(format!(
            "{} is below the smallest supported divisor {:e}",
            value, MIN_DIVISOR
        )));
    }
    Decimal::from_f64(value)
        .filter(|d| *d > Decimal::ZERO)
        .ok_or_else(|| {
            IndexerError::InvalidDivisor(format!("{} is outside the supported decimal range", value))
        })
}
