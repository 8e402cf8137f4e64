//! Typed repository over the document store.
//!
//! Converts between arena-core entities and stored JSON documents. Every
//! update is expressed as a closure on the typed record and executed inside
//! [`DocumentStore::modify`], so the read and the write can never interleave
//! with another writer.

use crate::document::{Collection, DocumentStore, Mutation};
use crate::memory::InMemoryDocumentStore;
use arena_core::{
    Agent, AgentId, ArenaError, ArenaResult, Battle, BattleId, BattleState, StorageError,
    SystemLog, SystemLogEntry,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

fn to_doc<T: Serialize>(record: &T) -> ArenaResult<Value> {
    serde_json::to_value(record).map_err(|e| StorageError::from(e).into())
}

fn from_doc<T: DeserializeOwned>(doc: Value) -> ArenaResult<T> {
    serde_json::from_value(doc).map_err(|e| StorageError::from(e).into())
}

/// Build a mutation that edits a document through its typed form.
fn typed_mutation<T, F>(f: F) -> Mutation
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut T) -> ArenaResult<()> + Send + 'static,
{
    Box::new(move |doc: &mut Value| {
        let mut record: T = from_doc(doc.clone())?;
        f(&mut record)?;
        *doc = to_doc(&record)?;
        Ok(())
    })
}

/// Typed access to agents, battles and system logs.
#[derive(Clone)]
pub struct ArenaStore {
    inner: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for ArenaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaStore").finish_non_exhaustive()
    }
}

impl ArenaStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner }
    }

    /// Store backed by a fresh [`InMemoryDocumentStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryDocumentStore::new()))
    }

    pub async fn ping(&self) -> ArenaResult<()> {
        self.inner.ping().await
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    pub async fn agent_insert(&self, agent: &Agent) -> ArenaResult<()> {
        self.inner
            .insert(Collection::Agents, &agent.agent_id.to_string(), to_doc(agent)?)
            .await
    }

    pub async fn agent_get(&self, agent_id: AgentId) -> ArenaResult<Option<Agent>> {
        self.inner
            .get(Collection::Agents, &agent_id.to_string())
            .await?
            .map(from_doc)
            .transpose()
    }

    /// Like [`agent_get`](Self::agent_get) but a missing agent is an error.
    pub async fn agent_require(&self, agent_id: AgentId) -> ArenaResult<Agent> {
        self.agent_get(agent_id)
            .await?
            .ok_or(ArenaError::AgentNotFound { agent_id })
    }

    pub async fn agent_list(&self) -> ArenaResult<Vec<Agent>> {
        self.inner
            .list(Collection::Agents)
            .await?
            .into_iter()
            .map(from_doc)
            .collect()
    }

    /// Atomically edit one agent record and return it as written.
    pub async fn agent_modify<F>(&self, agent_id: AgentId, f: F) -> ArenaResult<Agent>
    where
        F: FnOnce(&mut Agent) -> ArenaResult<()> + Send + 'static,
    {
        let doc = self
            .inner
            .modify(
                Collection::Agents,
                &agent_id.to_string(),
                typed_mutation::<Agent, _>(f),
            )
            .await
            .map_err(|e| not_found_as(e, ArenaError::AgentNotFound { agent_id }))?;
        from_doc(doc)
    }

    // ========================================================================
    // BATTLES
    // ========================================================================

    pub async fn battle_insert(&self, battle: &Battle) -> ArenaResult<()> {
        self.inner
            .insert(Collection::Battles, &battle.battle_id.to_string(), to_doc(battle)?)
            .await
    }

    pub async fn battle_get(&self, battle_id: BattleId) -> ArenaResult<Option<Battle>> {
        self.inner
            .get(Collection::Battles, &battle_id.to_string())
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn battle_require(&self, battle_id: BattleId) -> ArenaResult<Battle> {
        self.battle_get(battle_id)
            .await?
            .ok_or(ArenaError::BattleNotFound { battle_id })
    }

    /// All battles, oldest first.
    pub async fn battle_list(&self) -> ArenaResult<Vec<Battle>> {
        self.inner
            .list(Collection::Battles)
            .await?
            .into_iter()
            .map(from_doc)
            .collect()
    }

    /// Atomically edit one battle record without touching its state guard.
    pub async fn battle_modify<F>(&self, battle_id: BattleId, f: F) -> ArenaResult<Battle>
    where
        F: FnOnce(&mut Battle) -> ArenaResult<()> + Send + 'static,
    {
        let doc = self
            .inner
            .modify(
                Collection::Battles,
                &battle_id.to_string(),
                typed_mutation::<Battle, _>(f),
            )
            .await
            .map_err(|e| not_found_as(e, ArenaError::BattleNotFound { battle_id }))?;
        from_doc(doc)
    }

    /// Move a battle to `to` and apply `f` in the same atomic step.
    ///
    /// The transition is checked against the freshly read state, so of two
    /// racing writers exactly one can move a running battle to a terminal
    /// state. The loser gets [`ArenaError::InvalidStateTransition`].
    pub async fn battle_transition<F>(
        &self,
        battle_id: BattleId,
        to: BattleState,
        f: F,
    ) -> ArenaResult<Battle>
    where
        F: FnOnce(&mut Battle) + Send + 'static,
    {
        self.battle_modify(battle_id, move |battle| {
            if !battle.state.can_transition_to(to) {
                tracing::debug!(
                    battle_id = %battle_id,
                    from = %battle.state,
                    to = %to,
                    "Rejected battle transition"
                );
                return Err(ArenaError::InvalidStateTransition {
                    battle_id,
                    from: battle.state,
                    to,
                });
            }
            battle.state = to;
            f(battle);
            Ok(())
        })
        .await
    }

    /// Apply `f` unless the battle already reached a terminal state.
    pub async fn battle_update_unless_terminal<F>(
        &self,
        battle_id: BattleId,
        f: F,
    ) -> ArenaResult<Battle>
    where
        F: FnOnce(&mut Battle) + Send + 'static,
    {
        self.battle_modify(battle_id, move |battle| {
            if battle.state.is_terminal() {
                return Err(ArenaError::InvalidStateTransition {
                    battle_id,
                    from: battle.state,
                    to: BattleState::Running,
                });
            }
            f(battle);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // SYSTEM LOGS
    // ========================================================================

    pub async fn system_log_insert(&self, log: &SystemLog) -> ArenaResult<()> {
        self.inner
            .insert(Collection::System, &log.system_log_id.to_string(), to_doc(log)?)
            .await
    }

    pub async fn system_log_get(&self, system_log_id: Uuid) -> ArenaResult<Option<SystemLog>> {
        self.inner
            .get(Collection::System, &system_log_id.to_string())
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn system_log_append(
        &self,
        system_log_id: Uuid,
        entry: SystemLogEntry,
    ) -> ArenaResult<SystemLog> {
        let doc = self
            .inner
            .modify(
                Collection::System,
                &system_log_id.to_string(),
                typed_mutation::<SystemLog, _>(move |log| {
                    log.entries.push(entry);
                    Ok(())
                }),
            )
            .await?;
        from_doc(doc)
    }
}

fn not_found_as(err: ArenaError, replacement: ArenaError) -> ArenaError {
    match err {
        ArenaError::Storage(StorageError::NotFound { .. }) => replacement,
        other => other,
    }
}
