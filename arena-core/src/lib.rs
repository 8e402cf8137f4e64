//! Arena Core - Entity Types and Pure Rules
//!
//! Data structures for agents and battles plus the side-effect free rules
//! that operate on them: the ELO & stats engine, the agent lock transitions
//! and battle submission validation. All other crates depend on this one.
//! Nothing in here performs I/O.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod agent;
pub mod battle;
pub mod elo;
pub mod error;
pub mod lock;
pub mod validation;

pub use agent::{
    Agent, AgentStats, BattleOutcome, BattleResultEntry, EloRecord, ParticipantRequirement,
    RegisterInfo,
};
pub use battle::{
    Battle, BattleResult, BattleState, BattleStateParseError, InteractEntry, Opponent, SystemLog,
    SystemLogEntry,
};
pub use elo::{
    apply_battle_error, apply_battle_result, rating_changes, resolve_winner, RatingChange,
    WinnerResolution, DEFAULT_RATING, DRAW, ELO_STEP, GREEN_AGENT_ALIAS,
};
pub use error::{ArenaError, ArenaResult, StorageError};
pub use lock::{AgentStatus, AgentStatusParseError};
pub use validation::{validate_battle_request, OpponentRequest};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Agent identifier (UUIDv7, timestamp-sortable).
pub type AgentId = Uuid;

/// Battle identifier (UUIDv7, timestamp-sortable).
pub type BattleId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 identifier.
pub fn new_entity_id() -> Uuid {
    Uuid::now_v7()
}

/// Reporter name used for engine-generated interaction entries.
pub const SYSTEM_REPORTER: &str = "system";
