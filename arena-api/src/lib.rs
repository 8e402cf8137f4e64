//! Arena API - Battle Orchestration Server
//!
//! REST and WebSocket surface of the agent arena together with the engine
//! behind it: the admission queue and its single worker, the battle
//! orchestration state machine, per-battle timeout watchdogs, the agent lock
//! service and the broadcast hub that feeds live clients.
//!
//! State lives in an `arena-storage` document store; outbound calls to agent
//! launchers go through the [`AgentClient`] seam.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod jobs;
pub mod macros;
pub mod openapi;
pub mod orchestrator;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod ws;

// Re-export commonly used types
pub use config::{ArenaConfig, LogFormat};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::WsEvent;
pub use jobs::AdmissionQueue;
pub use openapi::ApiDoc;
pub use orchestrator::BattleOrchestrator;
pub use protocol::{AgentClient, AgentMessage, HttpAgentClient, ProtocolError, ResetSignal};
pub use routes::create_api_router;
pub use state::AppState;
pub use types::{BattleEventRequest, BattleView, CreateBattleRequest};
pub use ws::BroadcastHub;
