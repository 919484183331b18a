//! HTTP surface for health checks, depth snapshots and metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::book::DepthSnapshot;
use crate::error::{FeedError, Result};
use crate::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/depth", get(depth))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the HTTP surface until the process exits.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .http_bind
        .parse()
        .map_err(|e| FeedError::Config(format!("invalid http bind address: {e}")))?;

    info!(%addr, "starting http server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "depth-feed",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Current book snapshot, `{bids, offers}` in wire order.
async fn depth(State(state): State<Arc<AppState>>) -> Json<DepthSnapshot> {
    let book = state.book.read().await;
    Json(book.snapshot())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.gather(), &mut buffer) {
        error!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
