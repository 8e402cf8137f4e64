//! Arena Test Utilities
//!
//! Shared test infrastructure for the arena workspace:
//! - Fixtures for registered agents and submitted battles
//! - Proptest generators for identifiers, ratings and battle states
//! - Assertions for the lock and rating invariants

pub use arena_core::{
    Agent, AgentId, AgentStatus, Battle, BattleId, BattleState, Opponent, OpponentRequest,
    ParticipantRequirement, RegisterInfo, DEFAULT_RATING,
};

pub use fixtures::{battle_between, green_agent, green_agent_with_roles, red_agent, register_info};

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common testing scenarios.

    use super::*;
    use serde_json::json;

    /// Registration info pointing at fake localhost endpoints.
    pub fn register_info(alias: &str, is_green: bool) -> RegisterInfo {
        RegisterInfo {
            launcher_url: format!("http://127.0.0.1:9100/{}/launcher", alias),
            agent_url: format!("http://127.0.0.1:9100/{}/agent", alias),
            alias: alias.to_string(),
            is_green,
            participant_requirements: Vec::new(),
            battle_timeout_seconds: None,
            task_config: json!({"task": "test"}),
        }
    }

    /// Green agent declaring a single required `red` role.
    pub fn green_agent() -> Agent {
        green_agent_with_roles(&["red"])
    }

    /// Green agent declaring every given role as required.
    pub fn green_agent_with_roles(roles: &[&str]) -> Agent {
        let mut info = register_info("green", true);
        info.participant_requirements = roles
            .iter()
            .map(|name| ParticipantRequirement {
                name: name.to_string(),
                required: true,
            })
            .collect();
        Agent::register(info)
    }

    /// Unlocked, rated opponent agent.
    pub fn red_agent(alias: &str) -> Agent {
        Agent::register(register_info(alias, false))
    }

    /// Pending battle with each opponent filling the role of the same index.
    pub fn battle_between(green: &Agent, opponents: &[(&str, &Agent)]) -> Battle {
        Battle::new(
            green.agent_id,
            opponents
                .iter()
                .map(|(role, agent)| Opponent {
                    agent_id: agent.agent_id,
                    name: role.to_string(),
                    role: None,
                })
                .collect(),
            json!({}),
            Some("tester".to_string()),
        )
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for arena types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        any::<u128>().prop_map(uuid::Uuid::from_u128)
    }

    /// Ratings in a band around the default starting rating.
    pub fn arb_rating() -> impl Strategy<Value = i64> {
        (DEFAULT_RATING - 500)..(DEFAULT_RATING + 500)
    }

    pub fn arb_battle_state() -> impl Strategy<Value = BattleState> {
        prop_oneof![
            Just(BattleState::Pending),
            Just(BattleState::Queued),
            Just(BattleState::Running),
            Just(BattleState::Finished),
            Just(BattleState::Error),
        ]
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert that an agent was released after a battle.
pub fn assert_released(agent: &Agent) {
    assert_eq!(
        agent.status,
        AgentStatus::Unlocked,
        "agent {} still locked",
        agent.agent_id
    );
    assert!(!agent.ready, "agent {} still marked ready", agent.agent_id);
}

/// Assert the rating of a non-green agent.
pub fn assert_rating(agent: &Agent, expected: i64) {
    assert_eq!(
        agent.elo.rating,
        Some(expected),
        "unexpected rating for agent {}",
        agent.agent_id
    );
}
