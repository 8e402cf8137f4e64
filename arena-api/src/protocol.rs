//! Outbound Agent Protocol
//!
//! Request/response calls the orchestrator makes against agent launchers and
//! agents: reset, battle info and battle kickoff. [`AgentClient`] is the seam;
//! [`HttpAgentClient`] speaks JSON over HTTP with `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use arena_core::{AgentId, BattleId};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// PAYLOADS
// ============================================================================

/// Reset signal sent to an agent's launcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSignal {
    pub signal: String,
    pub agent_id: AgentId,
    pub backend_url: String,
    pub extra_args: serde_json::Value,
}

impl ResetSignal {
    pub fn new(agent_id: AgentId, backend_url: impl Into<String>, extra_args: serde_json::Value) -> Self {
        Self {
            signal: "reset".to_string(),
            agent_id,
            backend_url: backend_url.into(),
            extra_args,
        }
    }
}

/// Per-participant battle announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleInfo {
    pub battle_id: BattleId,
    pub agent_name: String,
    pub agent_id: AgentId,
    pub backend_url: String,
}

/// Battle context handed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleContext {
    pub battle_id: BattleId,
    pub backend_url: String,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_config: Option<serde_json::Value>,
}

/// Public coordinates of one opponent, as seen by the green agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentInfo {
    pub name: String,
    pub agent_url: String,
    pub agent_id: AgentId,
}

/// Kickoff message sent to the green agent only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStart {
    pub battle_id: BattleId,
    pub green_battle_context: BattleContext,
    /// Keyed by opponent agent URL
    pub red_battle_contexts: BTreeMap<String, BattleContext>,
    pub opponent_infos: Vec<OpponentInfo>,
}

/// Messages delivered to an agent URL, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    BattleInfo(BattleInfo),
    BattleStart(BattleStart),
}

// ============================================================================
// CLIENT TRAIT
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("agent answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable reply: {0}")]
    InvalidReply(String),
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Ask a launcher to reset its agent. `Ok(false)` means the launcher
    /// refused.
    async fn reset(&self, launcher_url: &str, signal: &ResetSignal) -> Result<bool, ProtocolError>;

    /// Deliver a message to an agent.
    async fn notify(&self, agent_url: &str, message: &AgentMessage) -> Result<(), ProtocolError>;
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

/// JSON-over-HTTP protocol client.
///
/// Resets are posted to `{launcher_url}/reset`; agent messages are posted to
/// the agent URL itself.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    http: reqwest::Client,
}

/// Launchers answer a reset with a bare boolean or `{"success": bool}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResetReply {
    Flag(bool),
    Object {
        #[serde(default = "default_success")]
        success: bool,
    },
}

fn default_success() -> bool {
    true
}

/// Decode a 2xx reset reply. An empty body counts as success.
fn parse_reset_reply(body: &[u8]) -> Result<bool, ProtocolError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(true);
    }
    match serde_json::from_slice::<ResetReply>(body) {
        Ok(ResetReply::Flag(success)) | Ok(ResetReply::Object { success }) => Ok(success),
        Err(_) => Err(ProtocolError::InvalidReply(
            String::from_utf8_lossy(body).chars().take(200).collect(),
        )),
    }
}

impl HttpAgentClient {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProtocolError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProtocolError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn reset(&self, launcher_url: &str, signal: &ResetSignal) -> Result<bool, ProtocolError> {
        let url = format!("{}/reset", launcher_url.trim_end_matches('/'));
        let response = self.post(&url, signal).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        parse_reset_reply(&body)
    }

    async fn notify(&self, agent_url: &str, message: &AgentMessage) -> Result<(), ProtocolError> {
        self.post(agent_url, message).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_reset_signal_shape() -> Result<(), serde_json::Error> {
        let agent_id = Uuid::now_v7();
        let value = serde_json::to_value(ResetSignal::new(agent_id, "http://arena", json!({})))?;
        assert_eq!(
            value,
            json!({
                "signal": "reset",
                "agentId": agent_id,
                "backendUrl": "http://arena",
                "extraArgs": {},
            })
        );
        Ok(())
    }

    #[test]
    fn test_reset_reply_forms() {
        assert_eq!(parse_reset_reply(b""), Ok(true));
        assert_eq!(parse_reset_reply(b"true"), Ok(true));
        assert_eq!(parse_reset_reply(b"false"), Ok(false));
        assert_eq!(parse_reset_reply(br#"{"success": false}"#), Ok(false));
        assert_eq!(parse_reset_reply(br#"{"success": true, "pid": 42}"#), Ok(true));
    }

    #[test]
    fn test_malformed_reset_reply_is_an_error() {
        assert!(matches!(
            parse_reset_reply(br#"{"success": "false"}"#),
            Err(ProtocolError::InvalidReply(_))
        ));
        assert!(matches!(
            parse_reset_reply(b"<html><body>Bad Gateway</body></html>"),
            Err(ProtocolError::InvalidReply(_))
        ));
    }

    #[test]
    fn test_battle_info_shape() -> Result<(), serde_json::Error> {
        let battle_id = Uuid::now_v7();
        let agent_id = Uuid::now_v7();
        let message = AgentMessage::BattleInfo(BattleInfo {
            battle_id,
            agent_name: "red".to_string(),
            agent_id,
            backend_url: "http://arena".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&message)?,
            json!({
                "type": "battle_info",
                "battleId": battle_id,
                "agentName": "red",
                "agentId": agent_id,
                "backendUrl": "http://arena",
            })
        );
        Ok(())
    }

    #[test]
    fn test_battle_start_shape() -> Result<(), serde_json::Error> {
        let battle_id = Uuid::now_v7();
        let red_id = Uuid::now_v7();
        let context = |name: &str, task: Option<serde_json::Value>| BattleContext {
            battle_id,
            backend_url: "http://arena".to_string(),
            agent_name: name.to_string(),
            task_config: task,
        };
        let message = AgentMessage::BattleStart(BattleStart {
            battle_id,
            green_battle_context: context("green_agent", Some(json!({"rounds": 3}))),
            red_battle_contexts: BTreeMap::from([(
                "http://red".to_string(),
                context("red", None),
            )]),
            opponent_infos: vec![OpponentInfo {
                name: "red".to_string(),
                agent_url: "http://red".to_string(),
                agent_id: red_id,
            }],
        });

        let value = serde_json::to_value(&message)?;
        assert_eq!(value["type"], "battle_start");
        assert_eq!(value["greenBattleContext"]["taskConfig"], json!({"rounds": 3}));
        assert_eq!(value["redBattleContexts"]["http://red"]["agentName"], "red");
        assert!(value["redBattleContexts"]["http://red"].get("taskConfig").is_none());
        assert_eq!(value["opponentInfos"][0]["agentId"], json!(red_id));
        Ok(())
    }
}
