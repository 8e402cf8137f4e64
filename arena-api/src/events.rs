//! WebSocket Event Types
//!
//! Messages pushed to `/ws/battles` and `/ws/battles/{id}/logs` subscribers.

use crate::types::BattleView;
use arena_core::{BattleId, InteractEntry, SystemLogEntry, SYSTEM_REPORTER};
use serde::{Deserialize, Serialize};

/// WebSocket event types for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    /// Full battle list, sent on connect and whenever the list changes.
    BattlesUpdate { battles: Vec<BattleView> },

    /// A single battle document changed.
    BattleUpdate { battle: BattleView },

    /// One entry of a battle's log stream.
    LogEntry {
        #[serde(rename = "battleId")]
        battle_id: BattleId,
        entry: InteractEntry,
    },
}

impl WsEvent {
    /// Get the event type name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            WsEvent::BattlesUpdate { .. } => "battles_update",
            WsEvent::BattleUpdate { .. } => "battle_update",
            WsEvent::LogEntry { .. } => "log_entry",
        }
    }

    /// Log stream event for a system log entry.
    pub fn system_log(battle_id: BattleId, entry: &SystemLogEntry) -> Self {
        WsEvent::LogEntry {
            battle_id,
            entry: InteractEntry {
                message: entry.message.clone(),
                reported_by: SYSTEM_REPORTER.to_string(),
                timestamp: entry.timestamp,
                is_result: false,
                detail: entry.detail.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_tags() -> Result<(), serde_json::Error> {
        let event = WsEvent::BattlesUpdate { battles: vec![] };
        assert_eq!(
            serde_json::to_value(&event)?,
            json!({"type": "battles_update", "battles": []})
        );

        let battle_id = uuid::Uuid::now_v7();
        let entry = SystemLogEntry::now("Battle started", None);
        let value = serde_json::to_value(WsEvent::system_log(battle_id, &entry))?;
        assert_eq!(value["type"], "log_entry");
        assert_eq!(value["battleId"], json!(battle_id));
        assert_eq!(value["entry"]["reportedBy"], "system");
        assert_eq!(value["entry"]["message"], "Battle started");
        Ok(())
    }
}
