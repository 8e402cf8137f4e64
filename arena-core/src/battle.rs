//! Battle sessions, their state machine and their interaction log.
//!
//! # State Transition Diagram
//!
//! ```text
//! Pending ──→ Queued ──→ Running ──→ Finished
//!                │           │
//!                └─────┬─────┘
//!                      ↓
//!                    Error
//! ```
//!
//! `Finished` and `Error` are terminal; a battle never leaves them.

use crate::{new_entity_id, AgentId, BattleId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// BATTLE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BattleState {
    /// Created by the submission API, not yet in the admission queue
    #[default]
    Pending,
    /// Waiting in the admission queue
    Queued,
    /// Being driven by the orchestrator or awaiting settlement
    Running,
    /// Settled with a result
    Finished,
    /// A lifecycle step failed
    Error,
}

impl BattleState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BattleState::Pending => "pending",
            BattleState::Queued => "queued",
            BattleState::Running => "running",
            BattleState::Finished => "finished",
            BattleState::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, BattleStateParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BattleState::Pending),
            "queued" => Ok(BattleState::Queued),
            "running" => Ok(BattleState::Running),
            "finished" => Ok(BattleState::Finished),
            "error" => Ok(BattleState::Error),
            _ => Err(BattleStateParseError(s.to_string())),
        }
    }

    /// Whether the battle has reached `finished` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleState::Finished | BattleState::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: BattleState) -> bool {
        use BattleState::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Queued, Running)
                | (Running, Finished)
                | (Pending, Error)
                | (Queued, Error)
                | (Running, Error)
        )
    }
}

impl fmt::Display for BattleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for BattleState {
    type Err = BattleStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid battle state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleStateParseError(pub String);

impl fmt::Display for BattleStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid battle state: {}", self.0)
    }
}

impl std::error::Error for BattleStateParseError {}

// ============================================================================
// BATTLE PARTS
// ============================================================================

/// An opponent slot of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Opponent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    /// Role name this opponent fills
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// One entry of a battle's append-only interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct InteractEntry {
    pub message: String,
    pub reported_by: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub is_result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub detail: Option<serde_json::Value>,
}

/// Final outcome recorded at settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BattleResult {
    /// Agent id, role name, or the literal `draw`
    pub winner: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub detail: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub finish_time: Timestamp,
}

// ============================================================================
// BATTLE
// ============================================================================

/// One arena session between a green agent and its opponents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    #[serde(rename = "battle_id")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub battle_id: BattleId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub green_agent_id: AgentId,
    pub opponents: Vec<Opponent>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub config: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[serde(default)]
    pub created_by: Option<String>,
    pub state: BattleState,
    #[serde(default)]
    pub interact_history: Vec<InteractEntry>,
    #[serde(default)]
    pub result: Option<BattleResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub system_log_id: Option<uuid::Uuid>,
}

impl Battle {
    /// A new battle in `pending`.
    pub fn new(
        green_agent_id: AgentId,
        opponents: Vec<Opponent>,
        config: serde_json::Value,
        created_by: Option<String>,
    ) -> Self {
        Self {
            battle_id: new_entity_id(),
            green_agent_id,
            opponents,
            config,
            created_at: chrono::Utc::now(),
            created_by,
            state: BattleState::Pending,
            interact_history: Vec::new(),
            result: None,
            error: None,
            system_log_id: None,
        }
    }

    /// Green agent first, then every opponent in submission order.
    pub fn participant_ids(&self) -> Vec<AgentId> {
        std::iter::once(self.green_agent_id)
            .chain(self.opponents.iter().map(|o| o.agent_id))
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// ============================================================================
// SYSTEM LOG
// ============================================================================

/// Entry in a battle's companion system log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SystemLogEntry {
    pub message: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub detail: Option<serde_json::Value>,
}

impl SystemLogEntry {
    pub fn now(message: impl Into<String>, detail: Option<serde_json::Value>) -> Self {
        Self {
            message: message.into(),
            timestamp: chrono::Utc::now(),
            detail,
        }
    }
}

/// Auxiliary log document created alongside every battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SystemLog {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub system_log_id: uuid::Uuid,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub battle_id: BattleId,
    #[serde(default)]
    pub entries: Vec<SystemLogEntry>,
}

impl SystemLog {
    pub fn for_battle(battle_id: BattleId) -> Self {
        Self {
            system_log_id: new_entity_id(),
            battle_id,
            entries: Vec::new(),
        }
    }
}
