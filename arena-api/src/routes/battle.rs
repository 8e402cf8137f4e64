//! Battle REST API Routes
//!
//! Submission, listing and the event ingestion callback agents use to report
//! interaction log entries and the final result.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    types::{BattleEventRequest, BattleView, CreateBattleRequest},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /battles - List all battles
#[utoipa::path(
    get,
    path = "/battles",
    tag = "Battles",
    responses(
        (status = 200, description = "All battles, oldest first", body = Vec<BattleView>),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn list_battles(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let positions = state.queue.positions().await;
    let battles: Vec<BattleView> = state
        .store
        .battle_list()
        .await?
        .into_iter()
        .map(|battle| {
            let position = positions.get(&battle.battle_id).copied();
            BattleView::new(battle, position)
        })
        .collect();

    Ok(Json(battles))
}

/// GET /battles/{id} - Get one battle
#[utoipa::path(
    get,
    path = "/battles/{id}",
    tag = "Battles",
    params(
        ("id" = Uuid, Path, description = "Battle ID")
    ),
    responses(
        (status = 200, description = "Battle details", body = BattleView),
        (status = 404, description = "Battle not found", body = ApiError),
    ),
)]
pub async fn get_battle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let battle = state.store.battle_require(id).await?;
    let position = state.queue.position(id).await;
    Ok(Json(BattleView::new(battle, position)))
}

/// POST /battles - Submit a battle
#[utoipa::path(
    post,
    path = "/battles",
    tag = "Battles",
    request_body = CreateBattleRequest,
    responses(
        (status = 201, description = "Battle queued", body = BattleView),
        (status = 400, description = "Agent locked or requirements not met", body = ApiError),
        (status = 404, description = "Agent not found", body = ApiError),
    ),
)]
pub async fn create_battle(
    State(state): State<AppState>,
    Json(req): Json<CreateBattleRequest>,
) -> ApiResult<impl IntoResponse> {
    let view = state.orchestrator.submit(req, &state.queue).await?;
    state.ensure_worker();

    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /battles/{id} - Ingest an interaction entry or the final result
#[utoipa::path(
    post,
    path = "/battles/{id}",
    tag = "Battles",
    params(
        ("id" = Uuid, Path, description = "Battle ID")
    ),
    request_body = BattleEventRequest,
    responses(
        (status = 204, description = "Event recorded"),
        (status = 400, description = "Battle already finished or invalid body", body = ApiError),
        (status = 404, description = "Battle not found", body = ApiError),
    ),
)]
pub async fn post_battle_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BattleEventRequest>,
) -> ApiResult<StatusCode> {
    if req.is_result {
        let winner = req
            .winner
            .clone()
            .filter(|w| !w.trim().is_empty())
            .ok_or_else(|| ApiError::missing_field("winner"))?;
        state.orchestrator.report_result(id, winner, req).await?;
    } else {
        state.orchestrator.append_event(id, req).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the battle routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_battles).post(create_battle))
        .route("/:id", get(get_battle).post(post_battle_event))
}
