//! Error types for the fee indexer

use thiserror::Error;

/// Fee indexer errors
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Invalid fee divisor: {0}")]
    InvalidDivisor(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Account not found for address {0}")]
    AccountNotFound(String),

    #[error("REST API error: {0}")]
    RestApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("No message received for {0} ms")]
    StaleConnection(u64),
}

impl From<tokio_tungstenite::tungstenite::Error> for IndexerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        IndexerError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        IndexerError::RestApiError(err.to_string())
    }
}

impl From<prometheus::Error> for IndexerError {
    fn from(err: prometheus::Error) -> Self {
        IndexerError::MetricsError(err.to_string())
    }
}

impl From<std::io::Error> for IndexerError {
    fn from(err: std::io::Error) -> Self {
        IndexerError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
