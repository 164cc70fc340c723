//! Wire types: agent card, task/artifact envelopes, JSON-RPC 2.0, and SSE events.
//!
//! Reserved JSON-RPC codes and the application code range (>= 1000) live
//! in [`crate::error`]; this module only carries the shapes that travel
//! over HTTP between fabric nodes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Agent card
// ============================================================================

/// Self-describing manifest for a remote agent, served at
/// `GET /a2a/agent-card`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Unique agent name.
    pub name: String,
    /// Agent version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Capability tags this agent advertises.
    pub capabilities: Vec<String>,
    /// Role -> URL endpoint mapping.
    pub endpoints: HashMap<String, String>,
    /// Supported communication modes (subset of `sync`, `streaming`).
    pub communication_modes: Vec<String>,
    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AgentCard {
    /// `true` if `mode` is among this card's advertised communication modes.
    pub fn supports(&self, mode: &str) -> bool {
        self.communication_modes.iter().any(|m| m == mode)
    }
}

// ============================================================================
// Task / artifact
// ============================================================================

/// A unit of work sent over the wire. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2ATask {
    /// Unique task identifier.
    pub id: String,
    /// Free-text instruction for the remote agent.
    pub instruction: String,
    /// Opaque caller-supplied context.
    #[serde(default)]
    pub context: serde_json::Value,
    /// Opaque state snapshot carried alongside the task.
    #[serde(default)]
    pub state_snapshot: serde_json::Value,
}

/// Outcome state of a processed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Task ran to completion.
    Completed,
    /// Task failed.
    Failed,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Completed => write!(f, "completed"),
            TaskOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// An immutable output of a task. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AArtifact {
    /// Unique artifact identifier.
    pub id: String,
    /// Task that produced this artifact.
    pub task_id: String,
    /// Artifact content.
    pub content: String,
    /// MIME type of `content`.
    pub content_type: String,
}

/// Result payload for `process_task`, carried in `A2AResponse.result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTaskResult {
    /// Artifacts produced while processing the task.
    pub artifacts: Vec<A2AArtifact>,
    /// Final outcome.
    pub status: TaskOutcome,
    /// Error detail, present only when `status == failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Arbitrary result metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// JSON-RPC 2.0 envelope
// ============================================================================

/// A JSON-RPC 2.0 request/notification identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(i64),
    /// Null — used for notifications with no expected response.
    Null,
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::Null => write!(f, "null"),
        }
    }
}

impl From<String> for JsonRpcId {
    fn from(s: String) -> Self {
        JsonRpcId::String(s)
    }
}

impl From<&str> for JsonRpcId {
    fn from(s: &str) -> Self {
        JsonRpcId::String(s.to_string())
    }
}

/// `A2ARequest` — a JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name, e.g. `"process_task"`.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request identifier.
    pub id: JsonRpcId,
}

impl JsonRpcRequest {
    /// Build a request envelope with the given method and params.
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: impl Into<JsonRpcId>) -> Self {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Some(params),
            id: id.into(),
        }
    }
}

/// `A2AResponse` — a JSON-RPC 2.0 response envelope. Exactly one of
/// `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Successful result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Identifier matching the originating request.
    pub id: JsonRpcId,
}

impl JsonRpcResponse {
    /// Build a successful response.
    pub fn success(id: JsonRpcId, result: serde_json::Value) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Build an error response.
    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object: `{code, message, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code — reserved (< 0) or application (>= 1000).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ============================================================================
// SSE event envelope
// ============================================================================

/// Every SSE event carries this envelope: `{"event": <type>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event type name.
    pub event: String,
    /// Event payload — shape depends on `event`.
    pub data: serde_json::Value,
}

impl SseEvent {
    /// Build an event with the given type and payload.
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        SseEvent {
            event: event.into(),
            data,
        }
    }

    /// Render as an SSE wire line: `data: <json>\n\n`.
    pub fn to_sse_line(&self) -> serde_json::Result<String> {
        let payload = serde_json::json!({"event": self.event, "data": self.data});
        Ok(format!("data: {}\n\n", serde_json::to_string(&payload)?))
    }

    /// `true` once this event type terminates the stream: an implicit close
    /// follows `plan_completed` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.event.as_str(), "plan_completed" | "error")
    }
}
