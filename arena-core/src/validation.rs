//! Battle submission validation.
//!
//! Checks a submission against the green agent's declared participant
//! requirements and the lock status of every referenced agent. Validation
//! never mutates state; a rejected submission leaves no trace.

use crate::agent::Agent;
use crate::battle::Opponent;
use crate::error::{ArenaError, ArenaResult};
use crate::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opponent as named in a submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct OpponentRequest {
    /// Role name; may be omitted when the green agent declares exactly one role
    #[serde(default)]
    pub name: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    #[serde(default)]
    pub role: Option<String>,
}

/// Validate a submission and resolve its opponent list.
///
/// `agents` must contain every agent the caller could find among the
/// referenced ids; a missing entry is reported as [`ArenaError::AgentNotFound`].
pub fn validate_battle_request(
    green: &Agent,
    requested: &[OpponentRequest],
    agents: &HashMap<AgentId, Agent>,
) -> ArenaResult<Vec<Opponent>> {
    if green.is_locked() {
        return Err(ArenaError::AgentNotUnlocked {
            agent_id: green.agent_id,
        });
    }
    if !green.is_green() {
        return Err(ArenaError::RequirementMismatch {
            reason: format!("agent {} is not a green agent", green.agent_id),
        });
    }

    let requirements = &green.register_info.participant_requirements;
    let mut filled: HashSet<String> = HashSet::new();
    let mut seated: HashSet<AgentId> = HashSet::new();
    let mut opponents = Vec::with_capacity(requested.len());

    for request in requested {
        let name = match (&request.name, requirements.len()) {
            (Some(name), _) => name.clone(),
            (None, 1) => requirements[0].name.clone(),
            (None, _) => {
                return Err(ArenaError::RequirementMismatch {
                    reason: format!(
                        "opponent {} needs a role name: green agent declares {} roles",
                        request.agent_id,
                        requirements.len()
                    ),
                })
            }
        };

        if !requirements.is_empty() && !requirements.iter().any(|r| r.name == name) {
            return Err(ArenaError::RequirementMismatch {
                reason: format!("role '{}' is not declared by the green agent", name),
            });
        }
        if !filled.insert(name.clone()) {
            return Err(ArenaError::RequirementMismatch {
                reason: format!("role '{}' is filled more than once", name),
            });
        }
        if request.agent_id == green.agent_id {
            return Err(ArenaError::RequirementMismatch {
                reason: format!("green agent {} cannot be its own opponent", green.agent_id),
            });
        }
        if !seated.insert(request.agent_id) {
            return Err(ArenaError::RequirementMismatch {
                reason: format!("agent {} is listed under more than one role", request.agent_id),
            });
        }

        let agent = agents
            .get(&request.agent_id)
            .ok_or(ArenaError::AgentNotFound {
                agent_id: request.agent_id,
            })?;
        if agent.is_locked() {
            return Err(ArenaError::AgentNotUnlocked {
                agent_id: agent.agent_id,
            });
        }

        opponents.push(Opponent {
            agent_id: request.agent_id,
            name,
            role: request.role.clone(),
        });
    }

    if let Some(missing) = requirements
        .iter()
        .find(|r| r.required && !filled.contains(&r.name))
    {
        return Err(ArenaError::RequirementMismatch {
            reason: format!("required role '{}' is not filled", missing.name),
        });
    }

    Ok(opponents)
}
