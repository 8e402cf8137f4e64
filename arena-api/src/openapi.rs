//! OpenAPI Specification for the Arena API
//!
//! Generated with utoipa from the route annotations and the schema derives
//! on the arena-core entity types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{agent, battle, health};
use crate::telemetry;
use crate::types::{BattleEventRequest, BattleView, CreateBattleRequest};

use arena_core::{
    Agent, AgentStats, AgentStatus, Battle, BattleOutcome, BattleResult, BattleResultEntry,
    BattleState, EloRecord, InteractEntry, Opponent, OpponentRequest, ParticipantRequirement,
    RegisterInfo,
};

/// OpenAPI document for the Arena API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arena API",
        version = "0.1.0",
        description = "Battle orchestration engine for the agent arena",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:9000", description = "Local Development")
    ),
    tags(
        (name = "Battles", description = "Battle submission, listing and event ingestion"),
        (name = "Agents", description = "Agent registration and readiness callbacks"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        battle::list_battles,
        battle::get_battle,
        battle::create_battle,
        battle::post_battle_event,
        agent::register_agent,
        agent::list_agents,
        agent::get_agent,
        agent::mark_ready,
        health::ping,
        health::liveness,
        health::readiness,
        telemetry::metrics::metrics_handler,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        Agent,
        AgentStatus,
        AgentStats,
        RegisterInfo,
        ParticipantRequirement,
        EloRecord,
        BattleResultEntry,
        BattleOutcome,
        Battle,
        BattleState,
        BattleResult,
        Opponent,
        OpponentRequest,
        InteractEntry,
        BattleView,
        CreateBattleRequest,
        BattleEventRequest,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
