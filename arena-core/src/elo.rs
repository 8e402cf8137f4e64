//! ELO & stats engine.
//!
//! Pure functions over a battle and its winner descriptor. The winner gains
//! [`ELO_STEP`], every other rated participant loses it, a draw moves nobody.
//! Green agents are never rated but still collect stats and history.
//!
//! The engine does no deduplication: callers invoke it at most once per
//! battle per agent.

use crate::agent::{Agent, BattleOutcome, BattleResultEntry};
use crate::battle::Battle;
use crate::{AgentId, Timestamp};
use uuid::Uuid;

/// Rating given to a non-green agent on registration.
pub const DEFAULT_RATING: i64 = 1000;

/// Points moved per decided battle.
pub const ELO_STEP: i64 = 15;

/// Winner descriptor for a drawn battle.
pub const DRAW: &str = "draw";

/// Winner descriptor naming the green agent by role.
pub const GREEN_AGENT_ALIAS: &str = "green_agent";

/// How a winner descriptor maps onto the battle's participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerResolution {
    Agent(AgentId),
    Draw,
    /// Descriptor matched nobody; settles like a draw
    Unresolved,
}

/// Rating delta for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingChange {
    pub agent_id: AgentId,
    pub outcome: BattleOutcome,
    pub delta: i64,
}

/// Resolve a winner descriptor against a battle.
///
/// Order: explicit agent id, opponent role/name, the literal `green_agent`,
/// then participant alias. First match wins, so duplicated opponent names
/// resolve to the earliest opponent.
pub fn resolve_winner(battle: &Battle, winner: &str, participants: &[Agent]) -> WinnerResolution {
    let winner = winner.trim();
    if winner.eq_ignore_ascii_case(DRAW) {
        return WinnerResolution::Draw;
    }

    let participant_ids = battle.participant_ids();

    if let Ok(id) = Uuid::parse_str(winner) {
        if participant_ids.contains(&id) {
            return WinnerResolution::Agent(id);
        }
    }

    if let Some(opponent) = battle
        .opponents
        .iter()
        .find(|o| o.role.as_deref() == Some(winner) || o.name == winner)
    {
        return WinnerResolution::Agent(opponent.agent_id);
    }

    if winner == GREEN_AGENT_ALIAS {
        return WinnerResolution::Agent(battle.green_agent_id);
    }

    participant_ids
        .iter()
        .find(|id| {
            participants
                .iter()
                .any(|a| a.agent_id == **id && a.alias() == winner)
        })
        .map(|id| WinnerResolution::Agent(*id))
        .unwrap_or(WinnerResolution::Unresolved)
}

/// Compute per-participant outcomes and deltas for a settled battle.
pub fn rating_changes(
    battle: &Battle,
    resolution: WinnerResolution,
    participants: &[Agent],
) -> Vec<RatingChange> {
    participants
        .iter()
        .map(|agent| {
            let exempt = agent.is_green() || agent.agent_id == battle.green_agent_id;
            let (outcome, delta) = match resolution {
                WinnerResolution::Agent(winner) if winner == agent.agent_id => {
                    (BattleOutcome::Win, ELO_STEP)
                }
                WinnerResolution::Agent(_) => (BattleOutcome::Loss, -ELO_STEP),
                WinnerResolution::Draw | WinnerResolution::Unresolved => (BattleOutcome::Draw, 0),
            };
            RatingChange {
                agent_id: agent.agent_id,
                outcome,
                delta: if exempt { 0 } else { delta },
            }
        })
        .collect()
}

/// Apply a settlement change to an agent: rating, stats and one history entry.
pub fn apply_battle_result(agent: &mut Agent, battle: &Battle, change: &RatingChange, at: Timestamp) {
    if !agent.is_green() {
        let current = agent.elo.rating.unwrap_or(DEFAULT_RATING);
        agent.elo.rating = Some(current + change.delta);
    }
    agent.elo.stats.record(change.outcome);
    push_history(agent, battle, change.outcome, change.delta, at);
}

/// Record an errored battle: error stat and history entry, no rating change.
pub fn apply_battle_error(agent: &mut Agent, battle: &Battle, at: Timestamp) {
    agent.elo.stats.record(BattleOutcome::Error);
    push_history(agent, battle, BattleOutcome::Error, 0, at);
}

fn push_history(agent: &mut Agent, battle: &Battle, result: BattleOutcome, elo_change: i64, at: Timestamp) {
    let final_rating = if agent.is_green() { None } else { agent.elo.rating };
    agent.elo.battle_history.push(BattleResultEntry {
        battle_id: battle.battle_id,
        timestamp: at,
        result,
        elo_change,
        final_rating,
        opponents: battle.opponents.clone(),
        green_agent_id: battle.green_agent_id,
    });
}
