//! Configuration module for the fee indexer

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the upstream market feed
    pub ws_endpoint: String,

    /// REST endpoint used for account lookups
    pub rest_endpoint: String,

    /// Raw fee units per display unit
    pub fee_divisor: f64,

    /// Markets `0..n` subscribed blindly on every connect
    pub blind_subscribe_count: u32,

    /// Keepalive and liveness settings
    pub heartbeat_interval_ms: u64,
    pub stale_threshold_ms: u64,

    /// Status log / prune interval
    pub diag_tick_interval_ms: u64,

    /// Fixed delay before every reconnect attempt
    pub reconnect_delay_ms: u64,

    /// Bind address for the HTTP API
    pub http_bind_addr: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            ws_endpoint: env::var("FEED_WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            rest_endpoint: env::var("REST_ENDPOINT").unwrap_or(defaults.rest_endpoint),
            fee_divisor: env::var("FEE_DIVISOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fee_divisor),
            blind_subscribe_count: env::var("BLIND_SUBSCRIBE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.blind_subscribe_count),
            heartbeat_interval_ms: env::var("HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.heartbeat_interval_ms),
            stale_threshold_ms: env::var("STALE_THRESHOLD_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stale_threshold_ms),
            diag_tick_interval_ms: env::var("DIAG_TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.diag_tick_interval_ms),
            reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reconnect_delay_ms),
            http_bind_addr: env::var("HTTP_BIND_ADDR").unwrap_or(defaults.http_bind_addr),
        };

        if !config.fee_divisor.is_finite() || config.fee_divisor <= 0.0 {
            anyhow::bail!("FEE_DIVISOR must be a positive number, got {}", config.fee_divisor);
        }

        Ok(config)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms.max(1))
    }

    /// Staleness is checked every `min(threshold, 2 * heartbeat)`
    pub fn stale_check_interval(&self) -> Duration {
        self.stale_threshold().min(self.heartbeat_interval() * 2)
    }

    pub fn diag_tick_interval(&self) -> Duration {
        Duration::from_millis(self.diag_tick_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://mainnet.zklighter.elliot.ai/stream".to_string(),
            rest_endpoint: "https://mainnet.zklighter.elliot.ai".to_string(),
            fee_divisor: 1_000_000.0,
            blind_subscribe_count: 512,
            heartbeat_interval_ms: 15_000,
            stale_threshold_ms: 45_000,
            diag_tick_interval_ms: 30_000,
            reconnect_delay_ms: 1_500,
            http_bind_addr: "0.0.0.0:9090".to_string(),
        }
    }
}
