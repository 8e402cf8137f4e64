//! Request and response bodies of the REST surface.

use arena_core::{AgentId, Battle, OpponentRequest, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// BATTLES
// ============================================================================

/// Battle document as served to clients.
///
/// Battles still waiting in the admission queue carry their 1-based
/// `queuePosition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BattleView {
    #[serde(flatten)]
    pub battle: Battle,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

impl BattleView {
    pub fn new(battle: Battle, queue_position: Option<usize>) -> Self {
        Self {
            battle,
            queue_position,
        }
    }
}

/// Body of `POST /battles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub green_agent_id: AgentId,

    #[serde(default)]
    pub opponents: Vec<OpponentRequest>,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub config: Option<serde_json::Value>,

    #[serde(default)]
    pub created_by: Option<String>,
}

/// Body of `POST /battles/{id}`: an interaction log entry or the final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BattleEventRequest {
    #[serde(default)]
    pub is_result: bool,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub detail: Option<serde_json::Value>,

    /// Agent id, role name, alias, `green_agent` or `draw`
    #[serde(default)]
    pub winner: Option<String>,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub timestamp: Option<Timestamp>,

    #[serde(default)]
    pub reported_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_test_utils::{battle_between, green_agent, red_agent};
    use serde_json::json;

    #[test]
    fn test_battle_view_flattens_battle() -> Result<(), serde_json::Error> {
        let green = green_agent();
        let red = red_agent("red-1");
        let battle = battle_between(&green, &[("red", &red)]);

        let queued = serde_json::to_value(BattleView::new(battle.clone(), Some(2)))?;
        assert_eq!(queued["battle_id"], json!(battle.battle_id));
        assert_eq!(queued["greenAgentId"], json!(green.agent_id));
        assert_eq!(queued["queuePosition"], json!(2));

        let running = serde_json::to_value(BattleView::new(battle, None))?;
        assert!(running.get("queuePosition").is_none());
        Ok(())
    }

    #[test]
    fn test_event_request_defaults() -> Result<(), serde_json::Error> {
        let req: BattleEventRequest = serde_json::from_value(json!({"message": "turn 1"}))?;
        assert!(!req.is_result);
        assert_eq!(req.message.as_deref(), Some("turn 1"));
        assert!(req.winner.is_none());

        let req: BattleEventRequest =
            serde_json::from_value(json!({"isResult": true, "winner": "draw"}))?;
        assert!(req.is_result);
        assert_eq!(req.winner.as_deref(), Some("draw"));
        Ok(())
    }
}
