//! WebSocket module for feed connection management

mod client;
mod manager;

pub use client::{FeedSink, FeedStream, Inbound, WebSocketClient};
pub use manager::{RetryPolicy, WebSocketManager};
