//! WebSocket connection manager
//!
//! Supervises the feed connection: subscribes on every connect, keeps the
//! link alive, forces a reconnect when the feed goes silent, and reconnects
//! after a fixed delay whenever the connection ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{FeedSink, Inbound, WebSocketClient};
use crate::error::{IndexerError, Result};
use crate::fees::now_ms;
use crate::subscription::SubscribeRequest;
use crate::AppState;

/// How the supervisor reacts to a lost connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Reconnect after a fixed delay, with no attempt limit and no backoff
    Forever { delay: Duration },
}

impl RetryPolicy {
    fn delay(&self) -> Duration {
        match self {
            RetryPolicy::Forever { delay } => *delay,
        }
    }
}

/// Manages the feed connection with automatic reconnection
pub struct WebSocketManager {
    state: Arc<AppState>,
    client: WebSocketClient,
    retry: RetryPolicy,
    running: AtomicBool,
}

impl WebSocketManager {
    /// Create a new WebSocket manager
    pub fn new(state: Arc<AppState>) -> Arc<Self> {
        let client = WebSocketClient::new(&state.config.ws_endpoint);
        let retry = RetryPolicy::Forever {
            delay: state.config.reconnect_delay(),
        };

        Arc::new(Self {
            state,
            client,
            retry,
            running: AtomicBool::new(false),
        })
    }

    /// Spawn the connection supervisor.
    ///
    /// Returns `false` without doing anything if the supervisor is already
    /// connected, connecting, or waiting to reconnect.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Feed supervisor already running");
            return false;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run().await });
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the supervisor loop indefinitely
    async fn run(&self) {
        info!(policy = ?self.retry, "Starting feed supervisor");

        loop {
            let stale = match self.connect_and_process().await {
                Ok(()) => {
                    info!("Feed connection closed by server");
                    false
                }
                Err(e) => {
                    let stale = matches!(e, IndexerError::StaleConnection(_));
                    warn!(error = %e, stale, "Feed connection lost");
                    stale
                }
            };

            if stale {
                self.state.metrics.stale_disconnects.inc();
            }
            self.state.indexer.write().await.on_disconnected(stale);
            self.state.metrics.live_markets.set(0);
            self.state.metrics.reconnects.inc();

            let delay = self.retry.delay();
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            sleep(delay).await;
        }
    }

    /// Connect, subscribe and process frames until the connection ends
    async fn connect_and_process(&self) -> Result<()> {
        self.state.indexer.write().await.on_connecting();

        let (mut sink, mut stream) = self.client.connect().await?;

        let requests = self.state.indexer.write().await.on_connected();
        info!(count = requests.len(), "Subscribing to feed channels");
        self.send_subscriptions(&mut sink, &requests).await;

        let config = &self.state.config;
        let stale_threshold = config.stale_threshold();
        let heartbeat_every = config.heartbeat_interval();
        let stale_every = config.stale_check_interval();
        let diag_every = config.diag_tick_interval();

        let start = Instant::now();
        let mut heartbeat = interval_at(start + heartbeat_every, heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stale_check = interval_at(start + stale_every, stale_every);
        stale_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut diag = interval_at(start + diag_every, diag_every);
        diag.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = sink.ping().await {
                        debug!(error = %e, "Keepalive ping failed");
                    }
                }
                _ = stale_check.tick() => {
                    let idle = last_inbound.elapsed();
                    if idle > stale_threshold {
                        warn!(
                            idle_ms = idle.as_millis() as u64,
                            threshold_ms = stale_threshold.as_millis() as u64,
                            "No message received within threshold, forcing reconnect"
                        );
                        sink.close().await;
                        return Err(IndexerError::StaleConnection(idle.as_millis() as u64));
                    }
                }
                _ = diag.tick() => {
                    let pruned = self.state.indexer.write().await.tick(now_ms());
                    self.state.metrics.expired_events.inc_by(pruned as u64);
                }
                inbound = stream.recv() => {
                    let inbound = match inbound {
                        Ok(inbound) => inbound,
                        Err(e) => {
                            sink.close().await;
                            return Err(e);
                        }
                    };
                    last_inbound = Instant::now();

                    match inbound {
                        Inbound::Text(text) => self.process_message(&mut sink, &text).await,
                        Inbound::Ping(payload) => {
                            self.state.indexer.write().await.record_keepalive(now_ms());
                            if let Err(e) = sink.pong(payload).await {
                                debug!(error = %e, "Failed to answer ping");
                            }
                        }
                        Inbound::Pong | Inbound::Other => {
                            self.state.indexer.write().await.record_keepalive(now_ms());
                        }
                        Inbound::Closed => {
                            sink.close().await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Process a single text frame and follow up on discovered markets
    async fn process_message(&self, sink: &mut FeedSink, raw: &str) {
        self.state.metrics.messages.inc();

        let (outcome, live) = {
            let mut indexer = self.state.indexer.write().await;
            let outcome = indexer.handle_message(raw, now_ms());
            (outcome, indexer.live_market_count())
        };

        self.state.metrics.fee_events.inc_by(outcome.fee_events as u64);
        self.send_subscriptions(sink, &outcome.subscribe).await;
        self.state.metrics.live_markets.set(live as i64);
    }

    /// Send subscribe frames; failures are logged and skipped since the
    /// connection may already be going away
    async fn send_subscriptions(&self, sink: &mut FeedSink, requests: &[SubscribeRequest]) {
        for request in requests {
            if let Err(e) = sink.subscribe(request).await {
                warn!(channel = %request.channel, error = %e, "Subscribe failed");
            }
        }
        if !requests.is_empty() {
            let live = self.state.indexer.read().await.live_market_count();
            self.state.metrics.live_markets.set(live as i64);
        }
    }
}
