//! HTTP API exposing indexer state to the dashboard

mod account;

pub use account::{account_index, validate_address, AccountResolver};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::diagnostics::IndexerDebug;
use crate::error::IndexerError;
use crate::fees::{now_ms, FeeEvent, RevenueSummary};
use crate::AppState;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/fees", get(fee_events))
        .route("/api/fees/revenue", get(revenue))
        .route("/api/indexer/debug", get(indexer_debug))
        .route("/api/indexer/reset", post(reset_indexer))
        .route("/api/indexer/divisor", post(set_fee_divisor))
        .route("/api/account/:address", get(resolve_account))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the API until the process exits
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.http_bind_addr.parse()?;
    info!(addr = %addr, "Starting HTTP API");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Error response with a status derived from the indexer error
pub struct ApiError(IndexerError);

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IndexerError::InvalidDivisor(_) | IndexerError::InvalidAddress(_) => {
                StatusCode::BAD_REQUEST
            }
            IndexerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            IndexerError::RestApiError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "ok": false, "error": self.0.to_string() }))).into_response()
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let connection = state.indexer.read().await.connection_state();
    Json(json!({
        "status": "healthy",
        "component": "fee-indexer",
        "feed": connection,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    Ok(state.metrics.encode()?)
}

#[derive(Debug, Default, Deserialize)]
pub struct FeeQuery {
    #[serde(default)]
    pub include_zero: bool,
}

async fn fee_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeeQuery>,
) -> Json<Vec<FeeEvent>> {
    let events = state
        .indexer
        .write()
        .await
        .fee_events(query.include_zero, now_ms());
    Json(events)
}

async fn revenue(State(state): State<Arc<AppState>>) -> Json<RevenueSummary> {
    Json(state.indexer.write().await.revenue_24h(now_ms()))
}

async fn indexer_debug(State(state): State<Arc<AppState>>) -> Json<IndexerDebug> {
    Json(state.indexer.write().await.debug_snapshot(now_ms()))
}

async fn reset_indexer(State(state): State<Arc<AppState>>) -> StatusCode {
    state.indexer.write().await.reset();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct DivisorRequest {
    /// Number, or numeric string
    pub value: Value,
}

async fn set_fee_divisor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DivisorRequest>,
) -> Result<Json<Value>, ApiError> {
    let value = match &request.value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };

    let mut indexer = state.indexer.write().await;
    indexer.set_fee_divisor(value)?;
    Ok(Json(json!({ "ok": true, "feeDivisor": indexer.fee_divisor().to_f64() })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub address: String,
    pub account_index: i64,
}

async fn resolve_account(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_index = state.accounts.resolve(&address).await?;
    Ok(Json(AccountResponse {
        address,
        account_index,
    }))
}
