use crate::{errors::ServiceError, metrics::gather_metrics, AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::time::Instant;

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub platform_relay: bool,
    pub cached_payment_links: usize,
    pub cache_capacity: usize,
}

async fn root_handler() -> &'static str {
    "Payment bridge is running and accepting order webhooks"
}

/// Liveness check with a summary of the payment-link cache.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.bridge.cache();
    Json(HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        platform_relay: state.bridge.platform().is_some(),
        cached_payment_links: cache.len().await,
        cache_capacity: cache.capacity(),
    })
}

async fn metrics_handler() -> Result<impl IntoResponse, ServiceError> {
    let body = gather_metrics()
        .map_err(|e| ServiceError::InternalError(format!("failed to encode metrics: {}", e)))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Endpoints:
/// - GET /        - plain-text banner
/// - GET /health  - liveness and cache summary
/// - GET /metrics - Prometheus text exposition
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
}
