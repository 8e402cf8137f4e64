//! Agent identity, capability and rating records.

use crate::battle::Opponent;
use crate::elo::DEFAULT_RATING;
use crate::lock::AgentStatus;
use crate::{new_entity_id, AgentId, BattleId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// REGISTRATION INFO
// ============================================================================

/// A role the green agent needs filled by an opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ParticipantRequirement {
    /// Role name, e.g. "red_agent"
    pub name: String,
    /// Whether a battle cannot start without this role
    #[serde(default)]
    pub required: bool,
}

/// Capability record supplied when the agent was registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RegisterInfo {
    /// Launcher process responsible for resetting this agent
    pub launcher_url: String,
    /// Public URL of the agent itself
    pub agent_url: String,
    /// Display name
    pub alias: String,
    #[serde(default)]
    pub is_green: bool,
    /// Roles a green agent expects opponents to fill
    #[serde(default)]
    pub participant_requirements: Vec<ParticipantRequirement>,
    /// Per-battle timeout declared by a green agent
    #[serde(default)]
    pub battle_timeout_seconds: Option<u64>,
    /// Task description handed to the green agent at kickoff
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub task_config: serde_json::Value,
}

// ============================================================================
// ELO RECORD
// ============================================================================

/// Outcome of one battle from a single participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Win,
    Loss,
    Draw,
    Error,
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BattleOutcome::Win => "win",
            BattleOutcome::Loss => "loss",
            BattleOutcome::Draw => "draw",
            BattleOutcome::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate battle counters and the rates derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub errors: u32,
    pub total_battles: u32,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub draw_rate: f64,
    pub error_rate: f64,
}

impl AgentStats {
    /// Count one more battle with the given outcome and refresh the rates.
    /// Errored battles count towards `total_battles` so the four rates sum to one.
    pub fn record(&mut self, outcome: BattleOutcome) {
        match outcome {
            BattleOutcome::Win => self.wins += 1,
            BattleOutcome::Loss => self.losses += 1,
            BattleOutcome::Draw => self.draws += 1,
            BattleOutcome::Error => self.errors += 1,
        }
        self.total_battles += 1;

        let total = f64::from(self.total_battles);
        self.win_rate = f64::from(self.wins) / total;
        self.loss_rate = f64::from(self.losses) / total;
        self.draw_rate = f64::from(self.draws) / total;
        self.error_rate = f64::from(self.errors) / total;
    }
}

/// One line of an agent's battle history. Written once per agent per battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BattleResultEntry {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub battle_id: BattleId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub result: BattleOutcome,
    pub elo_change: i64,
    /// Rating after the change; always `None` for green agents
    pub final_rating: Option<i64>,
    pub opponents: Vec<Opponent>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub green_agent_id: AgentId,
}

/// Rating, stats and history of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EloRecord {
    /// `None` for green agents, which are never rated
    pub rating: Option<i64>,
    #[serde(default)]
    pub stats: AgentStats,
    #[serde(default)]
    pub battle_history: Vec<BattleResultEntry>,
}

impl EloRecord {
    /// Initial record for a freshly registered agent.
    pub fn initial(is_green: bool) -> Self {
        Self {
            rating: if is_green { None } else { Some(DEFAULT_RATING) },
            stats: AgentStats::default(),
            battle_history: Vec::new(),
        }
    }
}

// ============================================================================
// AGENT
// ============================================================================

/// Identity and capability record for one battle participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(rename = "agent_id")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub register_info: RegisterInfo,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub ready: bool,
    pub elo: EloRecord,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Agent {
    /// Build a new, unlocked agent record from its registration info.
    pub fn register(register_info: RegisterInfo) -> Self {
        let elo = EloRecord::initial(register_info.is_green);
        Self {
            agent_id: new_entity_id(),
            register_info,
            status: AgentStatus::Unlocked,
            ready: false,
            elo,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn is_green(&self) -> bool {
        self.register_info.is_green
    }

    pub fn alias(&self) -> &str {
        &self.register_info.alias
    }
}
