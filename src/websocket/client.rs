//! WebSocket client for the upstream market feed
//!
//! Connects and splits the socket so the read half can sit in a `select!`
//! while the write half sends subscriptions and keepalives.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::error::{IndexerError, Result};
use crate::subscription::SubscribeRequest;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One frame read from the feed
#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Ping(Vec<u8>),
    Pong,
    /// Raw frames carry no data but still prove liveness
    Other,
    /// Server closed the connection
    Closed,
}

/// WebSocket client for a single endpoint
pub struct WebSocketClient {
    endpoint: String,
}

impl WebSocketClient {
    /// Create a new WebSocket client
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    /// Connect and split into write and read halves
    pub async fn connect(&self) -> Result<(FeedSink, FeedStream)> {
        info!(url = %self.endpoint, "Connecting to feed WebSocket");

        let (ws_stream, response) = connect_async(self.endpoint.as_str()).await.map_err(|e| {
            IndexerError::WebSocketConnection(format!("Failed to connect: {}", e))
        })?;

        info!(status = ?response.status(), "WebSocket connected");
        let (sink, stream) = ws_stream.split();

        Ok((FeedSink { sink }, FeedStream { stream }))
    }
}

/// Write half of a feed connection
pub struct FeedSink {
    sink: SplitSink<WsStream, Message>,
}

impl FeedSink {
    pub async fn subscribe(&mut self, request: &SubscribeRequest) -> Result<()> {
        self.sink
            .send(Message::Text(request.to_json()))
            .await
            .map_err(|e| IndexerError::WebSocketMessage(e.to_string()))
    }

    /// Send a ping to keep connection alive
    pub async fn ping(&mut self) -> Result<()> {
        self.sink
            .send(Message::Ping(vec![]))
            .await
            .map_err(|e| IndexerError::WebSocketMessage(e.to_string()))
    }

    pub async fn pong(&mut self, payload: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Pong(payload))
            .await
            .map_err(|e| IndexerError::WebSocketMessage(e.to_string()))
    }

    /// Close the connection without waiting on the peer
    pub async fn close(&mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Error while closing WebSocket"),
            Err(_) => debug!("Timed out closing WebSocket"),
        }
    }
}

/// Read half of a feed connection
pub struct FeedStream {
    stream: SplitStream<WsStream>,
}

impl FeedStream {
    /// Receive the next frame. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Inbound> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Inbound::Text(text))
            }
            Some(Ok(Message::Binary(data))) => {
                Ok(Inbound::Text(String::from_utf8_lossy(&data).to_string()))
            }
            Some(Ok(Message::Ping(data))) => Ok(Inbound::Ping(data)),
            Some(Ok(Message::Pong(_))) => Ok(Inbound::Pong),
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                Ok(Inbound::Closed)
            }
            Some(Ok(Message::Frame(_))) => Ok(Inbound::Other),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                Err(IndexerError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("WebSocket stream ended");
                Err(IndexerError::WebSocketConnection(
                    "Stream ended".to_string(),
                ))
            }
        }
    }
}
