//! Shared application state for Axum routers.

use std::sync::Arc;

use arena_storage::ArenaStore;
use tokio::sync::watch;

use crate::config::ArenaConfig;
use crate::jobs::AdmissionQueue;
use crate::orchestrator::BattleOrchestrator;
use crate::protocol::AgentClient;
use crate::ws::BroadcastHub;

/// Application-wide state shared across all routes.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: ArenaStore,
    /// Handle to the broadcast actor; cheap to clone.
    pub hub: BroadcastHub,
    pub queue: Arc<AdmissionQueue>,
    pub orchestrator: Arc<BattleOrchestrator>,
    pub config: Arc<ArenaConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the engine together. Spawns the broadcast actor, so this must
    /// run inside a Tokio runtime. The admission worker starts lazily on the
    /// first submission.
    pub fn new(
        store: ArenaStore,
        config: ArenaConfig,
        client: Arc<dyn AgentClient>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let config = Arc::new(config);
        let queue = Arc::new(AdmissionQueue::new(config.worker_idle, shutdown));
        let hub = BroadcastHub::spawn(store.clone(), Arc::clone(&queue), config.ws_channel_capacity);
        let orchestrator = Arc::new(BattleOrchestrator::new(
            store.clone(),
            hub.clone(),
            client,
            Arc::clone(&config),
        ));

        Self {
            store,
            hub,
            queue,
            orchestrator,
            config,
            start_time: std::time::Instant::now(),
        }
    }

    /// Start the admission worker if it is not running yet.
    pub fn ensure_worker(&self) {
        if self.queue.start_worker(Arc::clone(&self.orchestrator)) {
            tracing::debug!("Admission worker spawned");
        }
    }
}

crate::impl_from_ref!(ArenaStore, store);
crate::impl_from_ref!(BroadcastHub, hub);
crate::impl_from_ref!(Arc<AdmissionQueue>, queue);
crate::impl_from_ref!(Arc<BattleOrchestrator>, orchestrator);
crate::impl_from_ref!(Arc<ArenaConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);
