//! Error types for arena operations

use crate::battle::BattleState;
use crate::{AgentId, BattleId};
use thiserror::Error;

/// Document store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("Precondition failed for {collection}/{id}: {reason}")]
    PreconditionFailed {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Master error type for arena operations.
///
/// The first group is raised synchronously at submission time. The lifecycle
/// group never reaches a caller: the orchestrator turns it into the battle's
/// `error` transition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArenaError {
    #[error("Agent not found: {agent_id}")]
    AgentNotFound { agent_id: AgentId },

    #[error("Agent {agent_id} is not unlocked")]
    AgentNotUnlocked { agent_id: AgentId },

    #[error("Participant requirements not met: {reason}")]
    RequirementMismatch { reason: String },

    #[error("Battle not found: {battle_id}")]
    BattleNotFound { battle_id: BattleId },

    #[error("Failed to reset agent {agent_id}: {reason}")]
    ResetFailed { agent_id: AgentId, reason: String },

    #[error("Agents not ready after {waited_secs}s: {agents:?}")]
    ReadyTimeout {
        agents: Vec<AgentId>,
        waited_secs: u64,
    },

    #[error("Failed to send battle info to agent {agent_id}: {reason}")]
    NotifyFailed { agent_id: AgentId, reason: String },

    #[error("Failed to kick off battle with green agent {agent_id}: {reason}")]
    KickoffFailed { agent_id: AgentId, reason: String },

    #[error("Battle {battle_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        battle_id: BattleId,
        from: BattleState,
        to: BattleState,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ArenaError {
    /// Whether this error belongs to the orchestration lifecycle (and so
    /// ends the battle in `error` instead of being reported to a caller).
    pub fn is_lifecycle_failure(&self) -> bool {
        matches!(
            self,
            ArenaError::ResetFailed { .. }
                | ArenaError::ReadyTimeout { .. }
                | ArenaError::NotifyFailed { .. }
                | ArenaError::KickoffFailed { .. }
        )
    }
}

/// Result type alias for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
