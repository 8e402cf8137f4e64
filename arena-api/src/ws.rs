//! WebSocket Broadcast Hub
//!
//! Live battle state is pushed to two kinds of subscribers:
//!
//! - `/ws/battles`: the full battle list on connect, then `battles_update`
//!   and `battle_update` pushes
//! - `/ws/battles/{id}/logs`: the battle's existing log entries on connect,
//!   then every new entry
//!
//! ## Architecture
//!
//! A single actor task owns both subscriber sets and receives commands over
//! an unbounded channel, so any task (request handlers, the admission worker,
//! watchdogs) can broadcast without touching a connection. Each subscriber is
//! a bounded channel drained by its own connection task. Sends use
//! `try_send`: a closed subscriber is pruned, a full one misses that event.
//! Snapshots are enqueued to a new subscriber before it is registered, so no
//! live update can overtake its snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use arena_core::{Battle, BattleId, InteractEntry};
use arena_storage::ArenaStore;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::events::WsEvent;
use crate::jobs::AdmissionQueue;
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::BattleView;

// ============================================================================
// HUB HANDLE
// ============================================================================

enum HubCommand {
    SubscribeBattles {
        tx: mpsc::Sender<WsEvent>,
    },
    SubscribeLogs {
        battle_id: BattleId,
        tx: mpsc::Sender<WsEvent>,
    },
    BattlesChanged,
    BattleChanged {
        battle: Box<Battle>,
    },
    LogAppended {
        battle_id: BattleId,
        entry: InteractEntry,
    },
}

/// Cloneable handle to the broadcast actor.
#[derive(Clone)]
pub struct BroadcastHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    capacity: usize,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl BroadcastHub {
    /// Spawn the actor. `capacity` bounds every subscriber's queue.
    pub fn spawn(store: ArenaStore, queue: Arc<AdmissionQueue>, capacity: usize) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let actor = HubActor {
            store,
            queue,
            battle_subscribers: Vec::new(),
            log_subscribers: HashMap::new(),
        };
        tokio::spawn(actor.run(rx));
        Self {
            commands,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the battle list. The first event is the current list.
    pub fn subscribe_battles(&self) -> mpsc::Receiver<WsEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.send(HubCommand::SubscribeBattles { tx });
        rx
    }

    /// Subscribe to one battle's log. Existing entries arrive first.
    pub fn subscribe_logs(&self, battle_id: BattleId) -> mpsc::Receiver<WsEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.send(HubCommand::SubscribeLogs { battle_id, tx });
        rx
    }

    /// Push the full battle list to every list subscriber.
    pub fn battles_changed(&self) {
        self.send(HubCommand::BattlesChanged);
    }

    /// Push one updated battle to every list subscriber.
    pub fn battle_changed(&self, battle: Battle) {
        self.send(HubCommand::BattleChanged {
            battle: Box::new(battle),
        });
    }

    /// Push a log entry to the battle's log subscribers.
    pub fn log_appended(&self, battle_id: BattleId, entry: InteractEntry) {
        self.send(HubCommand::LogAppended { battle_id, entry });
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            warn!("Broadcast hub is gone, dropping event");
        }
    }
}

// ============================================================================
// ACTOR
// ============================================================================

struct HubActor {
    store: ArenaStore,
    queue: Arc<AdmissionQueue>,
    battle_subscribers: Vec<mpsc::Sender<WsEvent>>,
    log_subscribers: HashMap<BattleId, Vec<mpsc::Sender<WsEvent>>>,
}

impl HubActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!("Broadcast hub stopped");
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::SubscribeBattles { tx } => match self.battle_list().await {
                Ok(battles) => {
                    if offer(&tx, WsEvent::BattlesUpdate { battles }) {
                        self.battle_subscribers.push(tx);
                    }
                }
                Err(e) => error!(error = %e, "Failed to load battle list snapshot"),
            },
            HubCommand::SubscribeLogs { battle_id, tx } => {
                match self.log_snapshot(battle_id).await {
                    Ok(events) => {
                        if events.into_iter().all(|event| offer(&tx, event)) {
                            self.log_subscribers.entry(battle_id).or_default().push(tx);
                        }
                    }
                    Err(e) => {
                        error!(battle_id = %battle_id, error = %e, "Failed to load log snapshot")
                    }
                }
            }
            HubCommand::BattlesChanged => {
                if self.battle_subscribers.is_empty() {
                    return;
                }
                match self.battle_list().await {
                    Ok(battles) => deliver(
                        &mut self.battle_subscribers,
                        WsEvent::BattlesUpdate { battles },
                    ),
                    Err(e) => error!(error = %e, "Failed to load battle list"),
                }
            }
            HubCommand::BattleChanged { battle } => {
                if self.battle_subscribers.is_empty() {
                    return;
                }
                let position = self.queue.position(battle.battle_id).await;
                deliver(
                    &mut self.battle_subscribers,
                    WsEvent::BattleUpdate {
                        battle: BattleView::new(*battle, position),
                    },
                );
            }
            HubCommand::LogAppended { battle_id, entry } => {
                if let Some(subscribers) = self.log_subscribers.get_mut(&battle_id) {
                    deliver(subscribers, WsEvent::LogEntry { battle_id, entry });
                    if subscribers.is_empty() {
                        self.log_subscribers.remove(&battle_id);
                    }
                }
            }
        }
    }

    async fn battle_list(&self) -> arena_core::ArenaResult<Vec<BattleView>> {
        let positions = self.queue.positions().await;
        Ok(self
            .store
            .battle_list()
            .await?
            .into_iter()
            .map(|battle| {
                let position = positions.get(&battle.battle_id).copied();
                BattleView::new(battle, position)
            })
            .collect())
    }

    async fn log_snapshot(&self, battle_id: BattleId) -> arena_core::ArenaResult<Vec<WsEvent>> {
        let Some(battle) = self.store.battle_get(battle_id).await? else {
            return Ok(Vec::new());
        };
        let Some(log_id) = battle.system_log_id else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .system_log_get(log_id)
            .await?
            .map(|log| {
                log.entries
                    .iter()
                    .map(|entry| WsEvent::system_log(battle_id, entry))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Enqueue one event; false if the subscriber is gone.
fn offer(tx: &mpsc::Sender<WsEvent>, event: WsEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(
                event_type = event.event_type(),
                "Subscriber queue full, event dropped"
            );
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Send to every subscriber, pruning closed ones.
fn deliver(subscribers: &mut Vec<mpsc::Sender<WsEvent>>, event: WsEvent) {
    let before = subscribers.len();
    subscribers.retain(|tx| offer(tx, event.clone()));
    let pruned = before - subscribers.len();
    if pruned > 0 {
        debug!(
            event_type = event.event_type(),
            pruned = pruned,
            "Removed closed subscribers"
        );
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /ws/battles - battle list stream
pub async fn battles_ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<BroadcastHub>,
) -> Response {
    let rx = hub.subscribe_battles();
    ws.on_upgrade(move |socket| forward_events(socket, rx, "battles".to_string()))
}

/// GET /ws/battles/{id}/logs - battle log stream
pub async fn battle_logs_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(battle_id): Path<Uuid>,
) -> ApiResult<Response> {
    // Reject unknown battles before upgrading
    state.store.battle_require(battle_id).await?;

    let rx = state.hub.subscribe_logs(battle_id);
    Ok(ws.on_upgrade(move |socket| forward_events(socket, rx, format!("logs:{}", battle_id))))
}

/// Pump hub events into the socket until either side goes away.
async fn forward_events(socket: WebSocket, mut rx: mpsc::Receiver<WsEvent>, stream: String) {
    info!(stream = %stream, "WebSocket connected");
    if let Some(m) = metrics() {
        m.ws_connected();
    }

    let (mut sender, mut receiver) = socket.split();

    let client_stream = stream.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!(stream = %client_stream, "Client sent close frame");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(stream = %client_stream, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                if let Err(e) = send_event(&mut sender, &event).await {
                    debug!(stream = %stream, error = %e, "Failed to send event, closing connection");
                    break;
                }
            }
            _ = &mut recv_task => {
                debug!(stream = %stream, "Receiver task finished");
                break;
            }
        }
    }

    recv_task.abort();
    if let Some(m) = metrics() {
        m.ws_disconnected();
    }
    info!(stream = %stream, "WebSocket disconnected");
}

/// Serialize an event to JSON and send it as a text message.
async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &WsEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!(error = %e, "Failed to serialize event");
        axum::Error::new(e)
    })?;

    sender.send(Message::Text(json)).await
}
