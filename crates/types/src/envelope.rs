//! Wire envelope and tool response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::RuntimeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Handshake,
    Event,
    Heartbeat,
    Command,
    CommandResponse,
}

/// `{ type, payload, timestamp, sessionId }` — one object per WebSocket message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: Value,
    pub timestamp: i64,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    pub app_name: String,
    pub sdk_version: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatchPayload {
    pub events: Vec<RuntimeEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    pub command: String,
    pub request_id: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponsePayload {
    pub request_id: String,
    pub command: String,
    #[serde(flatten)]
    pub result: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseMetadata {
    pub time_range: TimeRange,
    pub event_count: u64,
    pub session_id: Option<String>,
}

/// Uniform tool response envelope. This is the one externally-facing
/// shape every tool call returns; the adapter that builds it is a thin
/// collaborator layered over the store/engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub summary: String,
    pub data: Value,
    pub issues: Vec<String>,
    pub metadata: ToolResponseMetadata,
}

impl ToolResponse {
    pub fn new(summary: impl Into<String>, data: Value, metadata: ToolResponseMetadata) -> Self {
        Self {
            summary: summary.into(),
            data,
            issues: Vec::new(),
            metadata,
        }
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }
}
