//! Feed counters and recent-activity rings for operator visibility

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::fees::{SampleDescriptor, SampleKind};

const RECENT_TYPES_CAPACITY: usize = 20;
const RECENT_SAMPLES_CAPACITY: usize = 10;

/// Connection lifecycle as seen by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Mutable counters kept by the indexer
#[derive(Debug, Default)]
pub struct FeedCounters {
    pub connection_state: ConnectionState,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub stale_disconnects: u64,
    pub messages_seen: u64,
    pub dropped_frames: u64,
    pub trade_events: u64,
    pub executed_tx_events: u64,
    pub type_counts: BTreeMap<String, u64>,
    pub last_message_at: Option<i64>,
    recent_types: VecDeque<String>,
    recent_samples: VecDeque<SampleDescriptor>,
}

impl FeedCounters {
    /// Any inbound frame, keepalives included
    pub fn touch(&mut self, now_ms: i64) {
        self.last_message_at = Some(now_ms);
    }

    pub fn record_type(&mut self, kind: &str) {
        *self.type_counts.entry(kind.to_string()).or_default() += 1;
        if self.recent_types.len() == RECENT_TYPES_CAPACITY {
            self.recent_types.pop_front();
        }
        self.recent_types.push_back(kind.to_string());
    }

    /// Count a batch of fee records and remember it as a sample
    pub fn record_sample(&mut self, kind: SampleKind, count: usize, now_ms: i64) {
        match kind {
            SampleKind::Trade => self.trade_events += count as u64,
            SampleKind::ExecutedTx => self.executed_tx_events += count as u64,
        }
        if self.recent_samples.len() == RECENT_SAMPLES_CAPACITY {
            self.recent_samples.pop_front();
        }
        self.recent_samples.push_back(SampleDescriptor {
            kind,
            timestamp: now_ms,
            count,
        });
    }

    pub fn recent_types(&self) -> Vec<String> {
        self.recent_types.iter().cloned().collect()
    }

    pub fn recent_samples(&self) -> Vec<SampleDescriptor> {
        self.recent_samples.iter().cloned().collect()
    }

    /// Zero message and event counters. Connection lifecycle counters are
    /// kept since the connection itself is untouched.
    pub fn reset(&mut self) {
        self.messages_seen = 0;
        self.dropped_frames = 0;
        self.trade_events = 0;
        self.executed_tx_events = 0;
        self.type_counts.clear();
        self.last_message_at = None;
        self.recent_types.clear();
        self.recent_samples.clear();
    }
}

/// Read-only snapshot served by the debug endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerDebug {
    pub ws_url: String,
    pub fee_divisor: f64,
    pub connection_state: ConnectionState,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub stale_disconnects: u64,
    pub messages_seen: u64,
    pub dropped_frames: u64,
    pub trade_events: u64,
    pub executed_tx_events: u64,
    pub type_counts: BTreeMap<String, u64>,
    pub desired_markets: Vec<i64>,
    pub live_markets: Vec<i64>,
    pub blind_subscribe_count: u32,
    pub recent_types: Vec<String>,
    pub recent_samples: Vec<SampleDescriptor>,
    pub last_message_at: Option<i64>,
    pub stored_events: usize,
    pub raw_trades: usize,
    pub raw_txs: usize,
}
