//! Connection supervisor tests against a local websocket server

use std::sync::Arc;
use std::time::{Duration, Instant};

use dex_fee_indexer::fees::now_ms;
use dex_fee_indexer::{AppState, Config, ConnectionState, WebSocketManager};
use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

const INITIAL_CHANNELS: [&str; 5] = [
    "market_stats/all",
    "executed_transaction",
    "trade/0",
    "trade/1",
    "trade/2",
];

async fn setup(stale_threshold_ms: u64) -> (TcpListener, Arc<AppState>) {
    setup_with(|config| config.stale_threshold_ms = stale_threshold_ms).await
}

async fn setup_with(adjust: impl FnOnce(&mut Config)) -> (TcpListener, Arc<AppState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = Config {
        ws_endpoint: format!("ws://{}", addr),
        blind_subscribe_count: 3,
        heartbeat_interval_ms: 10_000,
        stale_threshold_ms: 10_000,
        diag_tick_interval_ms: 60_000,
        reconnect_delay_ms: 50,
        ..Config::default()
    };
    adjust(&mut config);

    (listener, Arc::new(AppState::new(config).unwrap()))
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client did not connect in time")
        .unwrap();
    accept_async(tcp).await.unwrap()
}

/// Read `n` subscribe frames and return their channels
async fn read_channels(ws: &mut WebSocketStream<TcpStream>, n: usize) -> Vec<String> {
    let mut channels = Vec::new();
    while channels.len() < n {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no subscribe frame in time")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "subscribe");
            channels.push(value["channel"].as_str().unwrap().to_string());
        }
    }
    channels
}

#[tokio::test]
async fn test_subscribes_ingests_and_discovers_markets() {
    let (listener, state) = setup(10_000).await;
    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());

    let mut ws = accept(&listener).await;
    assert_eq!(read_channels(&mut ws, 5).await, INITIAL_CHANNELS);

    let trade_frame = json!({
        "type": "update/trade",
        "channel": "trade:3",
        "trades": [
            {"maker_fee": 500000, "taker_fee": 0, "timestamp": now_ms() / 1000, "market_id": 3},
            {"maker_fee": 0, "taker_fee": 0, "timestamp": now_ms() / 1000, "market_id": 3}
        ]
    });
    ws.send(Message::Text(trade_frame.to_string())).await.unwrap();
    ws.send(Message::Text("{\"type\":\"update/tr".to_string())).await.unwrap();
    let stats_frame = json!({"type": "update/market_stats", "market_stats": {"market_id": 9}});
    ws.send(Message::Text(stats_frame.to_string())).await.unwrap();

    assert_eq!(read_channels(&mut ws, 1).await, vec!["trade/9"]);

    let mut indexer = state.indexer.write().await;
    let debug = indexer.debug_snapshot(now_ms());
    assert_eq!(debug.connection_state, ConnectionState::Connected);
    assert_eq!(debug.stored_events, 1);
    assert_eq!(debug.dropped_frames, 1);
    assert_eq!(debug.live_markets, vec![0, 1, 2, 9]);
    assert_eq!(debug.desired_markets, vec![0, 1, 2, 9]);

    let revenue = indexer.revenue_24h(now_ms());
    assert_eq!(revenue.maker_total, dec!(0.5));
    assert_eq!(revenue.grand_total, dec!(0.5));
    assert_eq!(state.metrics.fee_events.get(), 1);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let (listener, state) = setup(10_000).await;
    let manager = WebSocketManager::new(state.clone());

    assert!(manager.start());
    assert!(!manager.start());
    assert!(manager.is_running());

    let mut ws = accept(&listener).await;
    assert_eq!(read_channels(&mut ws, 5).await, INITIAL_CHANNELS);
    assert!(!manager.start());

    // No second connection and no duplicate subscription traffic
    assert!(timeout(Duration::from_millis(300), listener.accept()).await.is_err());
    assert!(timeout(Duration::from_millis(200), ws.next()).await.is_err());
    let debug = state.indexer.write().await.debug_snapshot(now_ms());
    assert_eq!(debug.connections_opened, 1);
}

#[tokio::test]
async fn test_stale_connection_reconnects_once() {
    let (listener, state) = setup(300).await;
    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());

    // Hold the first connection open but never send anything
    let mut first = accept(&listener).await;
    assert_eq!(read_channels(&mut first, 5).await, INITIAL_CHANNELS);

    let mut second = accept(&listener).await;
    {
        let debug = state.indexer.write().await.debug_snapshot(now_ms());
        assert_eq!(debug.stale_disconnects, 1);
    }
    assert_eq!(state.metrics.stale_disconnects.get(), 1);
    assert_eq!(state.metrics.reconnects.get(), 1);

    // Live set was rebuilt from scratch on the new connection
    assert_eq!(read_channels(&mut second, 5).await, INITIAL_CHANNELS);
    drop(first);
}

#[tokio::test]
async fn test_server_close_triggers_reconnect() {
    let (listener, state) = setup(10_000).await;
    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());

    let mut first = accept(&listener).await;
    read_channels(&mut first, 5).await;
    first.close(None).await.unwrap();

    let mut second = accept(&listener).await;
    assert_eq!(read_channels(&mut second, 5).await, INITIAL_CHANNELS);

    let debug = state.indexer.write().await.debug_snapshot(now_ms());
    assert_eq!(debug.stale_disconnects, 0);
    assert_eq!(debug.connections_closed, 1);
    assert_eq!(debug.connections_opened, 2);
}

#[tokio::test]
async fn test_server_ping_is_answered_and_counts_as_activity() {
    let (listener, state) = setup(10_000).await;
    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());

    let mut ws = accept(&listener).await;
    read_channels(&mut ws, 5).await;
    ws.send(Message::Ping(b"alive".to_vec())).await.unwrap();

    let pong = loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no pong in time")
            .unwrap()
            .unwrap();
        if let Message::Pong(payload) = msg {
            break payload;
        }
    };
    assert_eq!(pong, b"alive".to_vec());
    let debug = state.indexer.write().await.debug_snapshot(now_ms());
    assert!(debug.last_message_at.is_some());
}

#[tokio::test]
async fn test_heartbeat_pings_on_schedule() {
    let (listener, state) = setup_with(|config| config.heartbeat_interval_ms = 50).await;
    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());

    let mut ws = accept(&listener).await;
    read_channels(&mut ws, 5).await;

    let started = Instant::now();
    let mut pings = 0;
    while pings < 3 {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("no heartbeat ping in time")
            .unwrap()
            .unwrap();
        if let Message::Ping(_) = msg {
            pings += 1;
        }
    }

    // Three pings at a 50ms period cannot arrive in under two periods
    assert!(started.elapsed() >= Duration::from_millis(90));
    let debug = state.indexer.write().await.debug_snapshot(now_ms());
    assert_eq!(debug.connections_opened, 1);
    assert_eq!(debug.stale_disconnects, 0);
}

#[tokio::test]
async fn test_diagnostic_tick_prunes_expired_events() {
    let (listener, state) = setup_with(|config| config.diag_tick_interval_ms = 50).await;

    let then = now_ms() - 49 * 3_600_000;
    let frame = json!({
        "type": "update/trade",
        "trades": [{"maker_fee": 1000000, "timestamp": then / 1000, "market_id": 1}]
    });
    let outcome = state
        .indexer
        .write()
        .await
        .handle_message(&frame.to_string(), then);
    assert_eq!(outcome.fee_events, 1);

    let manager = WebSocketManager::new(state.clone());
    assert!(manager.start());
    let mut ws = accept(&listener).await;
    read_channels(&mut ws, 5).await;

    timeout(Duration::from_secs(5), async {
        while state.metrics.expired_events.get() == 0 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("diagnostic tick did not prune");

    assert_eq!(state.metrics.expired_events.get(), 1);
    let debug = state.indexer.write().await.debug_snapshot(now_ms());
    assert_eq!(debug.stored_events, 0);
}
