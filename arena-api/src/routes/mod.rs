//! REST API Routes Module
//!
//! Includes:
//! - Battle submission, listing and event ingestion (`/battles`)
//! - Agent registration and readiness callbacks (`/agents`)
//! - WebSocket feeds (`/ws/battles`, `/ws/battles/{id}/logs`)
//! - Health check endpoints
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod agent;
pub mod battle;
pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::metrics_handler;
use crate::ws::{battle_logs_ws_handler, battles_ws_handler};

// Re-export route creation functions for convenience
pub use agent::create_router as agent_router;
pub use battle::create_router as battle_router;
pub use health::create_router as health_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from the configured origins.
///
/// An empty origin list allows all origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::OPTIONS,
    ]);

    if origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", origins);
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - REST routes under `/battles` and `/agents`
/// - WebSocket feeds under `/ws`
/// - Health checks at `/health/*`
/// - Metrics at `/metrics`
/// - OpenAPI spec at `/openapi.json`
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/battles", battle::create_router())
        .nest("/agents", agent::create_router())
        .nest("/health", health::create_router())
        .route("/ws/battles", get(battles_ws_handler))
        .route("/ws/battles/:id/logs", get(battle_logs_ws_handler))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
