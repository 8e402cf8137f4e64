//! Admission Queue and Worker
//!
//! Battles are driven through their startup lifecycle one at a time. The
//! queue is a mutex-guarded FIFO of battle ids; a single worker task pops
//! the front, runs the orchestration driver to completion of the kickoff
//! step, sleeps for the idle interval and repeats.
//!
//! The worker is started lazily by the first submission. Starting it again
//! is a no-op. A failing or panicking driver never stops the worker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_core::BattleId;
use tokio::sync::{watch, Mutex};

use crate::orchestrator::{BattleOrchestrator, HeldAgents};
use crate::telemetry::metrics;

/// FIFO of battles waiting to be driven.
#[derive(Debug)]
pub struct AdmissionQueue {
    pending: Mutex<VecDeque<BattleId>>,
    worker_running: AtomicBool,
    idle: Duration,
    shutdown: watch::Receiver<bool>,
}

impl AdmissionQueue {
    pub fn new(idle: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            worker_running: AtomicBool::new(false),
            idle,
            shutdown,
        }
    }

    /// Append a battle and return its 1-based position.
    pub async fn enqueue(&self, battle_id: BattleId) -> usize {
        let mut pending = self.pending.lock().await;
        if let Some(index) = pending.iter().position(|id| *id == battle_id) {
            return index + 1;
        }
        pending.push_back(battle_id);
        let depth = pending.len();
        if let Some(m) = metrics() {
            m.set_queue_depth(depth);
        }
        depth
    }

    /// Remove and return the oldest waiting battle.
    pub async fn pop(&self) -> Option<BattleId> {
        let mut pending = self.pending.lock().await;
        let next = pending.pop_front();
        if let Some(m) = metrics() {
            m.set_queue_depth(pending.len());
        }
        next
    }

    /// 1-based position of a waiting battle.
    pub async fn position(&self, battle_id: BattleId) -> Option<usize> {
        self.pending
            .lock()
            .await
            .iter()
            .position(|id| *id == battle_id)
            .map(|index| index + 1)
    }

    /// Positions of every waiting battle.
    pub async fn positions(&self) -> HashMap<BattleId, usize> {
        self.pending
            .lock()
            .await
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index + 1))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }

    /// Start the worker unless it is already running. Returns whether this
    /// call started it.
    pub fn start_worker(self: &Arc<Self>, orchestrator: Arc<BattleOrchestrator>) -> bool {
        if self
            .worker_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(idle_ms = queue.idle.as_millis() as u64, "Admission worker started");
            queue.run_worker(orchestrator).await;
            queue.worker_running.store(false, Ordering::SeqCst);
            tracing::info!("Admission worker stopped");
        });
        true
    }

    async fn run_worker(&self, orchestrator: Arc<BattleOrchestrator>) {
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(battle_id) = self.pop().await {
                drive_one(&orchestrator, battle_id).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.idle) => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Run the driver for one battle on its own task so a panic is contained.
/// After a panic only the agents the driver had locked are released.
async fn drive_one(orchestrator: &Arc<BattleOrchestrator>, battle_id: BattleId) {
    let held = HeldAgents::default();
    let driver = Arc::clone(orchestrator);
    let tracked = Arc::clone(&held);
    let handle = tokio::spawn(async move { driver.run_tracked(battle_id, tracked).await });

    if let Err(join_error) = handle.await {
        tracing::error!(
            battle_id = %battle_id,
            error = %join_error,
            "Battle driver aborted"
        );
        let agents = held.lock().await.clone();
        orchestrator
            .fail(battle_id, &agents, format!("internal error: {}", join_error))
            .await;
    }
}
