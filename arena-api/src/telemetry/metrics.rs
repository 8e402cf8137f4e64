//! Prometheus Metrics Definitions
//!
//! Defines the arena metrics and exposes a /metrics endpoint for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<ArenaMetrics>> = Lazy::new(ArenaMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static ArenaMetrics> {
    METRICS.as_ref().ok()
}

/// How a battle reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPath {
    /// Result reported by the green agent
    Settled,
    /// Watchdog fired while the battle was running
    Timeout,
    /// A lifecycle step failed
    Error,
}

impl SettlementPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementPath::Settled => "settled",
            SettlementPath::Timeout => "timeout",
            SettlementPath::Error => "error",
        }
    }
}

/// Container for all arena metrics.
#[derive(Clone)]
pub struct ArenaMetrics {
    /// Accepted battle submissions
    pub battles_submitted_total: Counter,

    /// Terminal transitions - labels: path
    pub battles_finished_total: CounterVec,

    /// Battles waiting in the admission queue
    pub admission_queue_depth: Gauge,

    /// Current active WebSocket connections
    pub websocket_connections: Gauge,

    /// Outbound protocol calls - labels: operation, status
    pub remote_calls_total: CounterVec,
}

impl ArenaMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            battles_submitted_total: register_counter!(
                "arena_battles_submitted_total",
                "Total number of accepted battle submissions"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register battles_submitted_total: {}", e)))?,

            battles_finished_total: register_counter_vec!(
                "arena_battles_finished_total",
                "Total number of battles that reached a terminal state",
                &["path"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register battles_finished_total: {}", e)))?,

            admission_queue_depth: register_gauge!(
                "arena_admission_queue_depth",
                "Number of battles waiting in the admission queue"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register admission_queue_depth: {}", e)))?,

            websocket_connections: register_gauge!(
                "arena_websocket_connections",
                "Current number of active WebSocket connections"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register websocket_connections: {}", e)))?,

            remote_calls_total: register_counter_vec!(
                "arena_remote_calls_total",
                "Total outbound agent protocol calls",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register remote_calls_total: {}", e)))?,
        })
    }

    pub fn battle_submitted(&self) {
        self.battles_submitted_total.inc();
    }

    pub fn battle_finished(&self, path: SettlementPath) {
        self.battles_finished_total
            .with_label_values(&[path.as_str()])
            .inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.admission_queue_depth.set(depth as f64);
    }

    pub fn ws_connected(&self) {
        self.websocket_connections.inc();
    }

    pub fn ws_disconnected(&self) {
        self.websocket_connections.dec();
    }

    pub fn record_remote_call(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.remote_calls_total
            .with_label_values(&[operation, status])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the arena families are registered before the first scrape
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
