//! Prometheus metrics for the feed connection

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::{IndexerError, Result};

/// Feed metrics registered on a dedicated registry
pub struct FeedMetrics {
    registry: Registry,
    pub messages: IntCounter,
    pub fee_events: IntCounter,
    pub reconnects: IntCounter,
    pub stale_disconnects: IntCounter,
    pub expired_events: IntCounter,
    pub live_markets: IntGauge,
}

impl FeedMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("fee_indexer".to_string()), None)?;

        let messages = IntCounter::new("feed_messages_total", "Text frames received from the feed")?;
        let fee_events = IntCounter::new("fee_events_total", "Fee events appended to the store")?;
        let reconnects = IntCounter::new("feed_reconnects_total", "Reconnect attempts scheduled")?;
        let stale_disconnects = IntCounter::new(
            "feed_stale_disconnects_total",
            "Connections closed by the staleness watchdog",
        )?;
        let expired_events = IntCounter::new(
            "fee_events_expired_total",
            "Fee events dropped by the periodic retention sweep",
        )?;
        let live_markets = IntGauge::new("live_markets", "Markets subscribed on the current connection")?;

        registry.register(Box::new(messages.clone()))?;
        registry.register(Box::new(fee_events.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(stale_disconnects.clone()))?;
        registry.register(Box::new(expired_events.clone()))?;
        registry.register(Box::new(live_markets.clone()))?;

        Ok(Self {
            registry,
            messages,
            fee_events,
            reconnects,
            stale_disconnects,
            expired_events,
            live_markets,
        })
    }

    /// Render all metrics in the text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| IndexerError::MetricsError(e.to_string()))
    }
}
