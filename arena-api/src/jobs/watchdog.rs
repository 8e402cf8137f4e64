//! Battle Timeout Watchdog
//!
//! One watchdog is armed per battle at kickoff. It sleeps for the battle's
//! timeout, then asks the orchestrator to settle the battle as a draw. If the
//! battle already reached a terminal state the settlement attempt is a no-op.

use std::sync::Arc;
use std::time::Duration;

use arena_core::BattleId;
use tokio::task::JoinHandle;

use crate::orchestrator::BattleOrchestrator;

/// Spawn the watchdog for `battle_id`.
pub fn arm_watchdog(
    orchestrator: Arc<BattleOrchestrator>,
    battle_id: BattleId,
    timeout: Duration,
) -> JoinHandle<()> {
    tracing::debug!(
        battle_id = %battle_id,
        timeout_secs = timeout.as_secs(),
        "Watchdog armed"
    );

    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        match orchestrator.settle_timeout(battle_id).await {
            Ok(Some(_)) => {
                tracing::info!(battle_id = %battle_id, "Battle timed out, settled as draw");
            }
            Ok(None) => {
                tracing::debug!(battle_id = %battle_id, "Watchdog fired after settlement");
            }
            Err(e) => {
                tracing::error!(battle_id = %battle_id, error = %e, "Watchdog settlement failed");
            }
        }
    })
}
