//! Desired vs live market subscriptions
//!
//! `desired` holds every market the indexer has ever wanted and only grows.
//! `live` holds markets subscribed on the current connection and is emptied
//! on every reconnect. Every market marked live is first added to desired.

use std::collections::BTreeSet;

/// Channel announcing stats for every market, used for discovery
pub const MARKET_STATS_CHANNEL: &str = "market_stats/all";
/// Catch-all channel for fees embedded in executed transactions
pub const EXECUTED_TX_CHANNEL: &str = "executed_transaction";

/// Per-market trade channel name
pub fn trade_channel(market_id: i64) -> String {
    format!("trade/{}", market_id)
}

/// Outbound `{"type":"subscribe","channel":...}` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    kind: &'static str,
    pub channel: String,
}

impl SubscribeRequest {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            kind: "subscribe",
            channel: channel.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "type": self.kind, "channel": self.channel }).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionTracker {
    desired: BTreeSet<i64>,
    live: BTreeSet<i64>,
    blind_range: u32,
}

impl SubscriptionTracker {
    pub fn new(blind_range: u32) -> Self {
        Self {
            desired: BTreeSet::new(),
            live: BTreeSet::new(),
            blind_range,
        }
    }

    /// Record interest in a market. Negative ids are ignored.
    pub fn want_subscribe(&mut self, market_id: i64) {
        if market_id >= 0 {
            self.desired.insert(market_id);
        }
    }

    /// Want the market and, if its trade channel is not live yet, return the
    /// request to send. The market counts as live once the request is handed
    /// out; a failed send is recovered by the next reconnect.
    pub fn ensure_subscribed(&mut self, market_id: i64) -> Option<SubscribeRequest> {
        if market_id < 0 {
            return None;
        }
        self.want_subscribe(market_id);
        if self.live.insert(market_id) {
            Some(SubscribeRequest::new(trade_channel(market_id)))
        } else {
            None
        }
    }

    /// Requests for a fresh connection: discovery, transaction fallback, the
    /// blind range `0..n`, then every desired market still not live
    pub fn resubscribe_all(&mut self) -> Vec<SubscribeRequest> {
        let mut requests = vec![
            SubscribeRequest::new(MARKET_STATS_CHANNEL),
            SubscribeRequest::new(EXECUTED_TX_CHANNEL),
        ];

        for market_id in 0..i64::from(self.blind_range) {
            requests.extend(self.ensure_subscribed(market_id));
        }

        let known: Vec<i64> = self.desired.iter().copied().collect();
        for market_id in known {
            requests.extend(self.ensure_subscribed(market_id));
        }

        requests
    }

    /// Forget what was live on the previous connection
    pub fn reset_live(&mut self) {
        self.live.clear();
    }

    pub fn desired(&self) -> &BTreeSet<i64> {
        &self.desired
    }

    pub fn live(&self) -> &BTreeSet<i64> {
        &self.live
    }

    pub fn blind_range(&self) -> u32 {
        self.blind_range
    }
}
