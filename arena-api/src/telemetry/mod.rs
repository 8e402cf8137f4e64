//! Arena Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the
//! orchestration engine and the API layer.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, ArenaMetrics, SettlementPath, METRICS};
pub use tracer::init_tracing;
