//! Agent lock transitions.
//!
//! An agent takes part in at most one running battle at a time. The
//! `status` flag on the agent record is the mutual-exclusion marker:
//!
//! ```text
//! Unlocked ─── lock() ──→ Locked ─── unlock_and_unready() ──→ Unlocked
//!                           │
//!                  ready cleared on lock,
//!                  set by the agent's own callback
//! ```

use crate::agent::Agent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AGENT STATUS ENUM
// ============================================================================

/// Mutual-exclusion flag carried by every agent record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Free to be scheduled into a battle
    #[default]
    Unlocked,
    /// Participating in a battle that has not settled yet
    Locked,
}

impl AgentStatus {
    /// Convert to the persisted string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentStatus::Unlocked => "unlocked",
            AgentStatus::Locked => "locked",
        }
    }

    /// Parse from the persisted string representation.
    pub fn from_db_str(s: &str) -> Result<Self, AgentStatusParseError> {
        match s.to_lowercase().as_str() {
            "unlocked" => Ok(AgentStatus::Unlocked),
            "locked" => Ok(AgentStatus::Locked),
            _ => Err(AgentStatusParseError(s.to_string())),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid agent status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusParseError(pub String);

impl fmt::Display for AgentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent status: {}", self.0)
    }
}

impl std::error::Error for AgentStatusParseError {}

// ============================================================================
// TRANSITIONS
// ============================================================================

impl Agent {
    /// Whether the agent is currently held by a battle.
    pub fn is_locked(&self) -> bool {
        self.status == AgentStatus::Locked
    }

    /// Mark the agent as taken by a battle. The ready flag is cleared so a
    /// fresh readiness report is required after the upcoming reset.
    pub fn lock(&mut self) {
        self.status = AgentStatus::Locked;
        self.ready = false;
    }

    /// Release the agent after its battle reached a terminal state.
    pub fn unlock_and_unready(&mut self) {
        self.status = AgentStatus::Unlocked;
        self.ready = false;
    }
}
