//! Lock Service
//!
//! Agent lock acquisition and release against the store, plus the startup
//! sweep that frees locks left behind by a crashed process.

use arena_core::{AgentId, ArenaError, ArenaResult, Battle, BattleState};
use arena_storage::ArenaStore;
use tracing::{info, warn};

/// Lock one agent for a battle.
///
/// Check-and-set inside a single store mutation: fails with
/// [`ArenaError::AgentNotUnlocked`] when another battle holds the agent.
/// Locking also clears `ready`.
pub async fn lock_agent(store: &ArenaStore, agent_id: AgentId) -> ArenaResult<()> {
    store
        .agent_modify(agent_id, move |agent| {
            if agent.is_locked() {
                return Err(ArenaError::AgentNotUnlocked { agent_id });
            }
            agent.lock();
            Ok(())
        })
        .await
        .map(|_| ())
}

/// Unlock and unready the given agents. Missing agents are skipped with a
/// warning so one deleted record cannot keep the others locked.
pub async fn release_agents(store: &ArenaStore, agent_ids: &[AgentId]) {
    for agent_id in agent_ids {
        let result = store
            .agent_modify(*agent_id, |agent| {
                agent.unlock_and_unready();
                Ok(())
            })
            .await;
        if let Err(e) = result {
            warn!(agent_id = %agent_id, error = %e, "Failed to release agent");
        }
    }
}

/// Unlock and unready every participant of a battle.
pub async fn unlock_and_unready(store: &ArenaStore, battle: &Battle) {
    release_agents(store, &battle.participant_ids()).await;
}

/// Startup sweep after a non-graceful shutdown.
///
/// No driver or watchdog survives a restart, so every non-terminal battle
/// left in the store is orphaned. Those battles are moved to `error` and
/// every locked agent is unlocked. Returns the number of agents released.
pub async fn recover_stale_locks(store: &ArenaStore) -> ArenaResult<usize> {
    for battle in store.battle_list().await? {
        if battle.is_terminal() {
            continue;
        }
        let result = store
            .battle_transition(battle.battle_id, BattleState::Error, |battle| {
                battle.error = Some("orchestrator restarted".to_string());
            })
            .await;
        match result {
            Ok(_) => info!(battle_id = %battle.battle_id, "Orphaned battle marked as error"),
            Err(e) => warn!(battle_id = %battle.battle_id, error = %e, "Failed to close orphaned battle"),
        }
    }

    let locked: Vec<AgentId> = store
        .agent_list()
        .await?
        .into_iter()
        .filter(|agent| agent.is_locked())
        .map(|agent| agent.agent_id)
        .collect();

    release_agents(store, &locked).await;
    if !locked.is_empty() {
        info!(released = locked.len(), "Released stale agent locks");
    }
    Ok(locked.len())
}

// =============================================================================
// TESTS
// =============================================================================
