//! Battle Orchestration
//!
//! Drives a battle from submission to a terminal state.
//!
//! ```text
//! submit ─→ pending ─→ queued ─→ running ─┬─→ finished   (result callback | watchdog)
//!                                          └─→ error      (any lifecycle step failed)
//! ```
//!
//! The admission worker calls [`BattleOrchestrator::run`] for one battle at a
//! time. `run` walks the startup lifecycle (resolve, lock, reset, ready wait,
//! inform, arm watchdog, kick off) and stops once the green agent has the
//! battle. From then on the battle only moves through [`report_result`],
//! [`append_event`] and the watchdog's [`settle_timeout`].
//!
//! Every terminal path wins the terminal write in the store first and only
//! then applies ratings, releases agents and broadcasts, so a battle is
//! settled exactly once no matter how many paths race.
//!
//! [`report_result`]: BattleOrchestrator::report_result
//! [`append_event`]: BattleOrchestrator::append_event
//! [`settle_timeout`]: BattleOrchestrator::settle_timeout

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use arena_core::{
    apply_battle_error, apply_battle_result, rating_changes, resolve_winner,
    validate_battle_request, Agent, AgentId, ArenaError, ArenaResult, Battle, BattleId,
    BattleResult, BattleState, InteractEntry, SystemLog, SystemLogEntry, WinnerResolution, DRAW,
    GREEN_AGENT_ALIAS, SYSTEM_REPORTER,
};
use arena_storage::ArenaStore;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ArenaConfig;
use crate::constants::DEFAULT_EVENT_REPORTER;
use crate::jobs::{arm_watchdog, AdmissionQueue};
use crate::protocol::{
    AgentClient, AgentMessage, BattleContext, BattleInfo, BattleStart, OpponentInfo, ResetSignal,
};
use crate::services::{lock_agent, release_agents, unlock_and_unready};
use crate::telemetry::{metrics, SettlementPath};
use crate::types::{BattleEventRequest, BattleView, CreateBattleRequest};
use crate::ws::BroadcastHub;

/// Shortest pause between two ready polls.
const MIN_READY_POLL: Duration = Duration::from_millis(10);

/// Agents a driver has locked so far, shared with whoever supervises it.
pub type HeldAgents = Arc<Mutex<Vec<AgentId>>>;

/// How the startup lifecycle ended when no step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Startup {
    KickedOff,
    /// The battle reached a terminal state before kickoff.
    Settled(BattleState),
}

pub struct BattleOrchestrator {
    store: ArenaStore,
    hub: BroadcastHub,
    client: Arc<dyn AgentClient>,
    config: Arc<ArenaConfig>,
}

impl std::fmt::Debug for BattleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleOrchestrator")
            .field("store", &self.store)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl BattleOrchestrator {
    pub fn new(
        store: ArenaStore,
        hub: BroadcastHub,
        client: Arc<dyn AgentClient>,
        config: Arc<ArenaConfig>,
    ) -> Self {
        Self {
            store,
            hub,
            client,
            config,
        }
    }

    // ========================================================================
    // SUBMISSION
    // ========================================================================

    /// Validate a submission and admit the resulting battle.
    ///
    /// Validation errors are returned before anything is written.
    pub async fn submit(
        &self,
        request: CreateBattleRequest,
        queue: &AdmissionQueue,
    ) -> ArenaResult<BattleView> {
        let green = self.store.agent_require(request.green_agent_id).await?;

        let mut agents = HashMap::new();
        for opponent in &request.opponents {
            if let Some(agent) = self.store.agent_get(opponent.agent_id).await? {
                agents.insert(agent.agent_id, agent);
            }
        }
        let opponents = validate_battle_request(&green, &request.opponents, &agents)?;

        let battle = Battle::new(
            green.agent_id,
            opponents,
            request.config.unwrap_or_else(|| json!({})),
            request.created_by,
        );
        self.admit(battle, queue).await
    }

    /// Persist a `pending` battle with its system log, move it to `queued`
    /// and append it to the admission queue.
    pub async fn admit(&self, mut battle: Battle, queue: &AdmissionQueue) -> ArenaResult<BattleView> {
        let battle_id = battle.battle_id;
        let log = SystemLog::for_battle(battle_id);
        battle.system_log_id = Some(log.system_log_id);

        self.store.system_log_insert(&log).await?;
        self.store.battle_insert(&battle).await?;

        let battle = self
            .store
            .battle_transition(battle_id, BattleState::Queued, |_| {})
            .await?;
        let battle = self.notice(&battle, "Battle queued", None).await;
        let position = queue.enqueue(battle_id).await;

        info!(
            battle_id = %battle_id,
            green_agent_id = %battle.green_agent_id,
            opponents = battle.opponents.len(),
            queue_position = position,
            "Battle queued"
        );
        if let Some(m) = metrics() {
            m.battle_submitted();
        }
        self.hub.battles_changed();

        Ok(BattleView::new(battle, Some(position)))
    }

    // ========================================================================
    // LIFECYCLE DRIVER
    // ========================================================================

    /// Drive one battle through its startup lifecycle.
    ///
    /// Never returns an error: a failed step ends the battle in `error`.
    pub async fn run(self: &Arc<Self>, battle_id: BattleId) {
        self.run_tracked(battle_id, HeldAgents::default()).await;
    }

    /// [`run`](Self::run), recording every agent the driver locks in `held`
    /// so a supervisor can release exactly those if the driver dies.
    pub async fn run_tracked(self: &Arc<Self>, battle_id: BattleId, held: HeldAgents) {
        let battle = match self
            .store
            .battle_transition(battle_id, BattleState::Running, |_| {})
            .await
        {
            Ok(battle) => battle,
            Err(e) => {
                warn!(battle_id = %battle_id, error = %e, "Dequeued battle is not runnable, skipping");
                return;
            }
        };
        info!(battle_id = %battle_id, state = %battle.state, "Battle started");
        let battle = self.notice(&battle, "Battle started", None).await;
        self.hub.battles_changed();

        match self.drive(&battle, &held).await {
            Ok(Startup::KickedOff) => {}
            Ok(Startup::Settled(state)) => {
                let agents = held.lock().await.clone();
                release_agents(&self.store, &agents).await;
                info!(
                    battle_id = %battle_id,
                    state = %state,
                    released = agents.len(),
                    "Battle settled during startup, kickoff abandoned"
                );
            }
            Err(e) => {
                let agents = held.lock().await.clone();
                self.fail(battle_id, &agents, e.to_string()).await;
            }
        }
    }

    async fn drive(
        self: &Arc<Self>,
        battle: &Battle,
        held: &Mutex<Vec<AgentId>>,
    ) -> ArenaResult<Startup> {
        let battle_id = battle.battle_id;

        // 1. Resolve participants
        let mut participants = Vec::new();
        for agent_id in battle.participant_ids() {
            participants.push(self.store.agent_require(agent_id).await?);
        }
        let green = participants[0].clone();

        // 2. Lock
        if let Some(state) = self.settled_state(battle_id).await? {
            return Ok(Startup::Settled(state));
        }
        for agent in &participants {
            lock_agent(&self.store, agent.agent_id).await?;
            held.lock().await.push(agent.agent_id);
        }
        self.notice(battle, "Participants locked", None).await;

        // 3. Reset
        for agent in &participants {
            self.reset_agent(agent).await?;
        }
        self.notice(battle, "Participants reset", None).await;

        // 4. Ready wait
        let ids: Vec<AgentId> = participants.iter().map(|a| a.agent_id).collect();
        self.wait_ready(battle_id, &ids).await?;
        if let Some(state) = self.settled_state(battle_id).await? {
            return Ok(Startup::Settled(state));
        }
        self.notice(battle, "Participants ready", None).await;

        // 5. Inform participants
        for agent in &participants {
            let message = AgentMessage::BattleInfo(BattleInfo {
                battle_id,
                agent_name: agent_name(battle, agent.agent_id),
                agent_id: agent.agent_id,
                backend_url: self.config.backend_url.clone(),
            });
            let outcome = self
                .client
                .notify(&agent.register_info.agent_url, &message)
                .await;
            record_remote_call("battle_info", outcome.is_ok());
            outcome.map_err(|e| ArenaError::NotifyFailed {
                agent_id: agent.agent_id,
                reason: e.to_string(),
            })?;
        }

        // 6. Watchdog
        if let Some(state) = self.settled_state(battle_id).await? {
            return Ok(Startup::Settled(state));
        }
        let timeout = self
            .config
            .battle_timeout(green.register_info.battle_timeout_seconds);
        arm_watchdog(Arc::clone(self), battle_id, timeout);

        // 7. Kick off
        let start = AgentMessage::BattleStart(self.battle_start(battle, &participants));
        let outcome = self
            .client
            .notify(&green.register_info.agent_url, &start)
            .await;
        record_remote_call("battle_start", outcome.is_ok());
        outcome.map_err(|e| ArenaError::KickoffFailed {
            agent_id: green.agent_id,
            reason: e.to_string(),
        })?;

        info!(
            battle_id = %battle_id,
            timeout_secs = timeout.as_secs(),
            "Battle kicked off"
        );
        let battle = self
            .notice(
                battle,
                "Battle kicked off",
                Some(json!({"timeoutSeconds": timeout.as_secs()})),
            )
            .await;
        self.hub.battle_changed(battle);
        Ok(Startup::KickedOff)
    }

    /// Terminal state the battle reached outside the driver, if any.
    async fn settled_state(&self, battle_id: BattleId) -> ArenaResult<Option<BattleState>> {
        let state = self.store.battle_require(battle_id).await?.state;
        Ok(state.is_terminal().then_some(state))
    }

    async fn reset_agent(&self, agent: &Agent) -> ArenaResult<()> {
        let signal = ResetSignal::new(agent.agent_id, self.config.backend_url.clone(), json!({}));
        let outcome = self
            .client
            .reset(&agent.register_info.launcher_url, &signal)
            .await;
        record_remote_call("reset", matches!(outcome, Ok(true)));

        match outcome {
            Ok(true) => {
                debug!(agent_id = %agent.agent_id, "Agent reset");
                Ok(())
            }
            Ok(false) => Err(ArenaError::ResetFailed {
                agent_id: agent.agent_id,
                reason: format!("launcher of '{}' refused the reset", agent.alias()),
            }),
            Err(e) => Err(ArenaError::ResetFailed {
                agent_id: agent.agent_id,
                reason: e.to_string(),
            }),
        }
    }

    /// Poll until every agent reports ready or the ready timeout elapses.
    /// Stops early, without error, once the battle is settled elsewhere.
    async fn wait_ready(&self, battle_id: BattleId, agent_ids: &[AgentId]) -> ArenaResult<()> {
        let timeout = self.config.ready_timeout;
        let interval = self.config.ready_poll_interval.max(MIN_READY_POLL);
        let deadline = Instant::now() + timeout;

        loop {
            if self.settled_state(battle_id).await?.is_some() {
                return Ok(());
            }
            let mut waiting = Vec::new();
            for agent_id in agent_ids {
                if !self.store.agent_require(*agent_id).await?.ready {
                    waiting.push(*agent_id);
                }
            }
            if waiting.is_empty() {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ArenaError::ReadyTimeout {
                    agents: waiting,
                    waited_secs: timeout.as_secs(),
                });
            }
            debug!(battle_id = %battle_id, waiting = waiting.len(), "Waiting for agents to report ready");
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }

    fn battle_start(&self, battle: &Battle, participants: &[Agent]) -> BattleStart {
        let backend_url = &self.config.backend_url;
        let context = |agent_name: String, task_config: Option<Value>| BattleContext {
            battle_id: battle.battle_id,
            backend_url: backend_url.clone(),
            agent_name,
            task_config,
        };

        let green_task = participants
            .iter()
            .find(|a| a.agent_id == battle.green_agent_id)
            .map(|a| a.register_info.task_config.clone());

        let mut red_battle_contexts = BTreeMap::new();
        let mut opponent_infos = Vec::new();
        for opponent in &battle.opponents {
            let Some(agent) = participants.iter().find(|a| a.agent_id == opponent.agent_id) else {
                continue;
            };
            let agent_url = agent.register_info.agent_url.clone();
            red_battle_contexts.insert(agent_url.clone(), context(opponent.name.clone(), None));
            opponent_infos.push(OpponentInfo {
                name: opponent.name.clone(),
                agent_url,
                agent_id: opponent.agent_id,
            });
        }

        BattleStart {
            battle_id: battle.battle_id,
            green_battle_context: context(GREEN_AGENT_ALIAS.to_string(), green_task),
            red_battle_contexts,
            opponent_infos,
        }
    }

    // ========================================================================
    // TERMINAL TRANSITIONS
    // ========================================================================

    /// Move a battle to `error`.
    ///
    /// `held` names the agents the driver locked; only those are released,
    /// so an agent locked by another battle stays locked. Error stats are
    /// recorded for every participant. A battle that is already terminal is
    /// left alone apart from releasing `held`.
    pub async fn fail(&self, battle_id: BattleId, held: &[AgentId], reason: String) {
        let recorded = reason.clone();
        let battle = match self
            .store
            .battle_transition(battle_id, BattleState::Error, move |battle| {
                battle.error = Some(recorded);
            })
            .await
        {
            Ok(battle) => battle,
            Err(ArenaError::InvalidStateTransition { from, .. }) => {
                debug!(battle_id = %battle_id, state = %from, "Battle already settled, failure ignored");
                release_agents(&self.store, held).await;
                return;
            }
            Err(e) => {
                error!(battle_id = %battle_id, error = %e, "Failed to record battle failure");
                return;
            }
        };
        warn!(battle_id = %battle_id, reason = %reason, "Battle failed");

        let at = chrono::Utc::now();
        for agent_id in battle.participant_ids() {
            let snapshot = battle.clone();
            let result = self
                .store
                .agent_modify(agent_id, move |agent| {
                    apply_battle_error(agent, &snapshot, at);
                    Ok(())
                })
                .await;
            if let Err(e) = result {
                warn!(battle_id = %battle_id, agent_id = %agent_id, error = %e, "Failed to record error stats");
            }
        }

        release_agents(&self.store, held).await;

        if let Some(m) = metrics() {
            m.battle_finished(SettlementPath::Error);
        }
        let battle = self
            .notice(&battle, format!("Battle failed: {}", reason), None)
            .await;
        self.hub.battle_changed(battle);
        self.hub.battles_changed();
    }

    /// Settle a battle from a result callback.
    ///
    /// The report itself is appended to the interaction log in the same
    /// write that finishes the battle.
    pub async fn report_result(
        &self,
        battle_id: BattleId,
        winner: String,
        request: BattleEventRequest,
    ) -> ArenaResult<Battle> {
        let entry = InteractEntry {
            message: request
                .message
                .unwrap_or_else(|| format!("Battle result: {}", winner)),
            reported_by: request
                .reported_by
                .unwrap_or_else(|| DEFAULT_EVENT_REPORTER.to_string()),
            timestamp: request.timestamp.unwrap_or_else(chrono::Utc::now),
            is_result: true,
            detail: request.detail.clone(),
        };
        let detail = request.detail.unwrap_or_else(|| json!({}));
        self.settle(battle_id, winner, detail, Some(entry), SettlementPath::Settled)
            .await
    }

    /// Watchdog settlement. `Ok(None)` when the battle already settled.
    pub async fn settle_timeout(&self, battle_id: BattleId) -> ArenaResult<Option<Battle>> {
        match self
            .settle(
                battle_id,
                DRAW.to_string(),
                json!({"reason": "timeout"}),
                None,
                SettlementPath::Timeout,
            )
            .await
        {
            Ok(battle) => Ok(Some(battle)),
            Err(ArenaError::InvalidStateTransition { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn settle(
        &self,
        battle_id: BattleId,
        winner: String,
        detail: Value,
        report: Option<InteractEntry>,
        path: SettlementPath,
    ) -> ArenaResult<Battle> {
        let current = self.store.battle_require(battle_id).await?;
        if current.state != BattleState::Running {
            return Err(ArenaError::InvalidStateTransition {
                battle_id,
                from: current.state,
                to: BattleState::Finished,
            });
        }

        let participants = self.participants(&current).await?;
        let resolution = resolve_winner(&current, &winner, &participants);
        let recorded_winner = match resolution {
            WinnerResolution::Agent(_) => winner.trim().to_string(),
            WinnerResolution::Draw => DRAW.to_string(),
            WinnerResolution::Unresolved => {
                warn!(battle_id = %battle_id, winner = %winner, "Winner matches no participant, settling as draw");
                DRAW.to_string()
            }
        };

        let finish_time = chrono::Utc::now();
        let result = BattleResult {
            winner: recorded_winner.clone(),
            detail,
            finish_time,
        };
        let pushed = report.clone();
        let battle = self
            .store
            .battle_transition(battle_id, BattleState::Finished, move |battle| {
                if let Some(entry) = pushed {
                    battle.interact_history.push(entry);
                }
                battle.result = Some(result);
            })
            .await?;

        if let Some(entry) = report {
            self.hub.log_appended(battle_id, entry);
        }

        for change in rating_changes(&battle, resolution, &participants) {
            let snapshot = battle.clone();
            let result = self
                .store
                .agent_modify(change.agent_id, move |agent| {
                    apply_battle_result(agent, &snapshot, &change, finish_time);
                    Ok(())
                })
                .await;
            if let Err(e) = result {
                warn!(battle_id = %battle_id, agent_id = %change.agent_id, error = %e, "Failed to apply rating change");
            }
        }

        unlock_and_unready(&self.store, &battle).await;

        info!(
            battle_id = %battle_id,
            winner = %recorded_winner,
            path = path.as_str(),
            "Battle finished"
        );
        if let Some(m) = metrics() {
            m.battle_finished(path);
        }
        let battle = self
            .notice(
                &battle,
                "Battle finished",
                Some(json!({"winner": recorded_winner, "path": path.as_str()})),
            )
            .await;
        self.hub.battle_changed(battle.clone());
        self.hub.battles_changed();
        Ok(battle)
    }

    // ========================================================================
    // EVENT INGESTION
    // ========================================================================

    /// Append a non-result interaction entry. Rejected once the battle is
    /// terminal.
    pub async fn append_event(
        &self,
        battle_id: BattleId,
        request: BattleEventRequest,
    ) -> ArenaResult<Battle> {
        let entry = InteractEntry {
            message: request.message.unwrap_or_default(),
            reported_by: request
                .reported_by
                .unwrap_or_else(|| DEFAULT_EVENT_REPORTER.to_string()),
            timestamp: request.timestamp.unwrap_or_else(chrono::Utc::now),
            is_result: false,
            detail: request.detail,
        };
        let pushed = entry.clone();
        let battle = self
            .store
            .battle_update_unless_terminal(battle_id, move |battle| {
                battle.interact_history.push(pushed);
            })
            .await?;

        self.hub.log_appended(battle_id, entry);
        self.hub.battle_changed(battle.clone());
        Ok(battle)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Participants that still exist, green agent first.
    async fn participants(&self, battle: &Battle) -> ArenaResult<Vec<Agent>> {
        let mut agents = Vec::new();
        for agent_id in battle.participant_ids() {
            match self.store.agent_get(agent_id).await? {
                Some(agent) => agents.push(agent),
                None => warn!(battle_id = %battle.battle_id, agent_id = %agent_id, "Participant no longer registered"),
            }
        }
        Ok(agents)
    }

    /// Record a system notice: system log, interaction history and the live
    /// log stream. Returns the battle as written, or `battle` unchanged if the
    /// write failed.
    async fn notice(&self, battle: &Battle, message: impl Into<String>, detail: Option<Value>) -> Battle {
        let battle_id = battle.battle_id;
        let entry = SystemLogEntry::now(message, detail);

        if let Some(log_id) = battle.system_log_id {
            if let Err(e) = self.store.system_log_append(log_id, entry.clone()).await {
                warn!(battle_id = %battle_id, error = %e, "Failed to append system log entry");
            }
        }

        let interact = InteractEntry {
            message: entry.message,
            reported_by: SYSTEM_REPORTER.to_string(),
            timestamp: entry.timestamp,
            is_result: false,
            detail: entry.detail,
        };
        self.hub.log_appended(battle_id, interact.clone());

        match self
            .store
            .battle_modify(battle_id, move |battle| {
                battle.interact_history.push(interact);
                Ok(())
            })
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!(battle_id = %battle_id, error = %e, "Failed to mirror system notice");
                battle.clone()
            }
        }
    }
}

/// Name an agent plays in a battle: `green_agent` or its opponent role.
fn agent_name(battle: &Battle, agent_id: AgentId) -> String {
    if agent_id == battle.green_agent_id {
        return GREEN_AGENT_ALIAS.to_string();
    }
    battle
        .opponents
        .iter()
        .find(|o| o.agent_id == agent_id)
        .map(|o| o.name.clone())
        .unwrap_or_else(|| agent_id.to_string())
}

fn record_remote_call(operation: &str, success: bool) {
    if let Some(m) = metrics() {
        m.record_remote_call(operation, success);
    }
}
