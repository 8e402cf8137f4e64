//! Arena API Server Entry Point
//!
//! Loads configuration, recovers agent locks left by a previous run and
//! starts the Axum HTTP server.

use std::sync::Arc;

use arena_api::services::recover_stale_locks;
use arena_api::telemetry::init_tracing;
use arena_api::{create_api_router, ApiError, ApiResult, AppState, ArenaConfig, HttpAgentClient};
use arena_storage::ArenaStore;
use axum::Router;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ArenaConfig::from_env()?;
    init_tracing(config.log_format)?;

    let store = ArenaStore::in_memory();
    let released = recover_stale_locks(&store).await?;
    tracing::info!(released, "Startup lock sweep complete");

    let addr = config.socket_addr()?;
    let client = Arc::new(HttpAgentClient::new(config.agent_request_timeout)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = AppState::new(store, config, client, shutdown_rx);
    let app: Router = create_api_router(state);

    tracing::info!(%addr, "Starting arena API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    // Stop the admission worker after the last request drained
    let _ = shutdown_tx.send(true);
    tracing::info!("Arena API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
