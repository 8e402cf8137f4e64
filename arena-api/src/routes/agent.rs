//! Agent REST API Routes
//!
//! Registration, lookup and the readiness callback an agent calls once it
//! has finished resetting.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use arena_core::{Agent, RegisterInfo};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /agents - Register a new agent
#[utoipa::path(
    post,
    path = "/agents",
    tag = "Agents",
    request_body = RegisterInfo,
    responses(
        (status = 201, description = "Agent registered successfully", body = Agent),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
)]
pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterInfo>,
) -> ApiResult<impl IntoResponse> {
    // Validate required fields
    if req.alias.trim().is_empty() {
        return Err(ApiError::missing_field("alias"));
    }
    if req.launcher_url.trim().is_empty() {
        return Err(ApiError::missing_field("launcherUrl"));
    }
    if req.agent_url.trim().is_empty() {
        return Err(ApiError::missing_field("agentUrl"));
    }
    if !req.is_green && !req.participant_requirements.is_empty() {
        return Err(ApiError::invalid_input(
            "Only green agents may declare participant requirements",
        ));
    }

    let agent = Agent::register(req);
    state.store.agent_insert(&agent).await?;

    tracing::info!(
        agent_id = %agent.agent_id,
        alias = %agent.alias(),
        is_green = agent.is_green(),
        "Agent registered"
    );

    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /agents - List all agents
#[utoipa::path(
    get,
    path = "/agents",
    tag = "Agents",
    responses(
        (status = 200, description = "List of agents", body = Vec<Agent>),
    ),
)]
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let agents = state.store.agent_list().await?;
    Ok(Json(agents))
}

/// GET /agents/{id} - Get agent by ID
#[utoipa::path(
    get,
    path = "/agents/{id}",
    tag = "Agents",
    params(
        ("id" = Uuid, Path, description = "Agent ID")
    ),
    responses(
        (status = 200, description = "Agent details", body = Agent),
        (status = 404, description = "Agent not found", body = ApiError),
    ),
)]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let agent = state.store.agent_require(id).await?;
    Ok(Json(agent))
}

/// PUT /agents/{id}/ready - Readiness callback
#[utoipa::path(
    put,
    path = "/agents/{id}/ready",
    tag = "Agents",
    params(
        ("id" = Uuid, Path, description = "Agent ID")
    ),
    responses(
        (status = 200, description = "Agent marked ready", body = Agent),
        (status = 404, description = "Agent not found", body = ApiError),
    ),
)]
pub async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let agent = state
        .store
        .agent_modify(id, |agent| {
            agent.ready = true;
            Ok(())
        })
        .await?;

    tracing::debug!(agent_id = %id, status = %agent.status, "Agent reported ready");
    Ok(Json(agent))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the agent routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(register_agent))
        .route("/:id", get(get_agent))
        .route("/:id/ready", put(mark_ready))
}
