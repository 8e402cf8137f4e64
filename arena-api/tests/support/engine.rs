//! Engine harness: a scripted protocol client and an in-memory arena.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arena_api::{
    AgentClient, AgentMessage, AppState, ArenaConfig, BattleView, CreateBattleRequest,
    ProtocolError, ResetSignal,
};
use arena_core::{Agent, AgentId, ArenaResult, Battle, BattleId, BattleState, OpponentRequest};
use arena_storage::ArenaStore;
use async_trait::async_trait;
use tokio::sync::watch;

// ============================================================================
// SCRIPTED CLIENT
// ============================================================================

/// One outbound call seen by the scripted client.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reset { launcher_url: String, agent_id: AgentId },
    Notify { agent_url: String, message: AgentMessage },
}

/// Protocol client that answers from a script instead of the network.
///
/// A successful reset marks the agent ready, standing in for the agent's own
/// readiness callback, unless the agent is listed in `never_ready`.
pub struct ScriptedClient {
    store: ArenaStore,
    calls: Mutex<Vec<Call>>,
    never_ready: Mutex<HashSet<AgentId>>,
    refuse_reset: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    panic_on_reset: Mutex<HashSet<AgentId>>,
}

impl ScriptedClient {
    pub fn new(store: ArenaStore) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
            never_ready: Mutex::new(HashSet::new()),
            refuse_reset: Mutex::new(HashSet::new()),
            unreachable: Mutex::new(HashSet::new()),
            panic_on_reset: Mutex::new(HashSet::new()),
        }
    }

    pub fn never_ready(&self, agent: &Agent) {
        self.never_ready.lock().expect("lock").insert(agent.agent_id);
    }

    pub fn refuse_reset(&self, agent: &Agent) {
        self.refuse_reset
            .lock()
            .expect("lock")
            .insert(agent.register_info.launcher_url.clone());
    }

    pub fn unreachable(&self, agent: &Agent) {
        self.unreachable
            .lock()
            .expect("lock")
            .insert(agent.register_info.agent_url.clone());
    }

    /// Make the reset of `agent` panic inside the driver task.
    pub fn panic_on_reset(&self, agent: &Agent) {
        self.panic_on_reset.lock().expect("lock").insert(agent.agent_id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn resets(&self) -> Vec<AgentId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Reset { agent_id, .. } => Some(agent_id),
                _ => None,
            })
            .collect()
    }

    pub fn messages_to(&self, agent: &Agent) -> Vec<AgentMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Notify { agent_url, message } if agent_url == agent.register_info.agent_url => {
                    Some(message)
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    async fn reset(&self, launcher_url: &str, signal: &ResetSignal) -> Result<bool, ProtocolError> {
        self.calls.lock().expect("lock").push(Call::Reset {
            launcher_url: launcher_url.to_string(),
            agent_id: signal.agent_id,
        });

        let explode = self.panic_on_reset.lock().expect("lock").contains(&signal.agent_id);
        if explode {
            panic!("launcher crashed while resetting {}", signal.agent_id);
        }
        if self.refuse_reset.lock().expect("lock").contains(launcher_url) {
            return Ok(false);
        }
        let becomes_ready = !self.never_ready.lock().expect("lock").contains(&signal.agent_id);
        if becomes_ready {
            self.store
                .agent_modify(signal.agent_id, |agent| {
                    agent.ready = true;
                    Ok(())
                })
                .await
                .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        }
        Ok(true)
    }

    async fn notify(&self, agent_url: &str, message: &AgentMessage) -> Result<(), ProtocolError> {
        self.calls.lock().expect("lock").push(Call::Notify {
            agent_url: agent_url.to_string(),
            message: message.clone(),
        });

        if self.unreachable.lock().expect("lock").contains(agent_url) {
            return Err(ProtocolError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// ARENA
// ============================================================================

/// Config with short timeouts for tests.
pub fn test_config() -> ArenaConfig {
    ArenaConfig {
        backend_url: "http://arena.test".to_string(),
        ready_timeout: Duration::from_secs(10),
        ready_poll_interval: Duration::from_secs(1),
        default_battle_timeout: Duration::from_secs(60),
        worker_idle: Duration::from_millis(20),
        ws_channel_capacity: 64,
        ..ArenaConfig::default()
    }
}

pub struct TestArena {
    pub state: AppState,
    pub client: Arc<ScriptedClient>,
    shutdown: watch::Sender<bool>,
}

impl TestArena {
    pub fn new(config: ArenaConfig) -> Self {
        let store = ArenaStore::in_memory();
        let client = Arc::new(ScriptedClient::new(store.clone()));
        let (shutdown, rx) = watch::channel(false);
        let state = AppState::new(store, config, client.clone(), rx);
        Self {
            state,
            client,
            shutdown,
        }
    }

    pub fn store(&self) -> &ArenaStore {
        &self.state.store
    }

    pub async fn register(&self, agents: &[&Agent]) {
        for agent in agents {
            self.store().agent_insert(agent).await.expect("register agent");
        }
    }

    pub async fn agent(&self, agent: &Agent) -> Agent {
        self.store()
            .agent_require(agent.agent_id)
            .await
            .expect("agent exists")
    }

    pub async fn battle(&self, battle_id: BattleId) -> Battle {
        self.store()
            .battle_require(battle_id)
            .await
            .expect("battle exists")
    }

    /// Submit a battle the way `POST /battles` does.
    pub async fn submit(&self, green: &Agent, opponents: &[(&str, &Agent)]) -> ArenaResult<BattleView> {
        let request = CreateBattleRequest {
            green_agent_id: green.agent_id,
            opponents: opponents
                .iter()
                .map(|(name, agent)| OpponentRequest {
                    name: Some(name.to_string()),
                    agent_id: agent.agent_id,
                    role: None,
                })
                .collect(),
            config: None,
            created_by: Some("tester".to_string()),
        };
        let view = self
            .state
            .orchestrator
            .submit(request, &self.state.queue)
            .await?;
        self.state.ensure_worker();
        Ok(view)
    }

    /// Wait (in paused time) until the battle reaches `state`.
    pub async fn wait_for(&self, battle_id: BattleId, state: BattleState) -> Battle {
        for _ in 0..2_000 {
            let battle = self.battle(battle_id).await;
            if battle.state == state {
                // Let the terminal path finish its agent updates
                self.settle_tasks().await;
                return self.battle(battle_id).await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("battle {} never reached {}", battle_id, state);
    }

    /// Let spawned tasks run without advancing the battle clock much.
    pub async fn settle_tasks(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
