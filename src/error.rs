//! Error taxonomy for the orchestration fabric.
//!
//! `OrchestratorError` covers the nine error kinds a caller or operator
//! needs to distinguish: transport, protocol, remote-agent, circuit-open,
//! validation, capacity, state, LLM, and interrupt. Each variant carries a
//! human-readable message and an optional structured `data` payload, the
//! same shape the JSON-RPC wire codec (`crate::wire`) uses for its own
//! error objects, so an `OrchestratorError` converts losslessly into a
//! `JsonRpcError` at the server boundary.

use crate::wire::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes (wire-level)
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// Application error codes (>= 1000)
// ---------------------------------------------------------------------------

/// The remote agent reported a failure (`status: "failed"` or an
/// `Error:`-prefixed artifact).
pub const REMOTE_FAILURE: i64 = 1000;

/// A circuit breaker short-circuited the call.
pub const CIRCUIT_OPEN: i64 = 1001;

/// Input failed validation (length cap, empty, malicious pattern).
pub const VALIDATION_FAILED: i64 = 1002;

/// Capacity exhausted (pool quota, retry budget, recursion limit).
pub const CAPACITY_EXCEEDED: i64 = 1003;

/// State is missing, corrupt, or fails schema validation after decode.
pub const STATE_ERROR: i64 = 1004;

/// The LLM provider failed, truncated, or produced invalid output.
pub const LLM_ERROR: i64 = 1005;

/// The operation was interrupted by a user-initiated cancellation.
pub const INTERRUPTED: i64 = 1006;

// ---------------------------------------------------------------------------
// OrchestratorError
// ---------------------------------------------------------------------------

/// Unified error type for the orchestration fabric.
///
/// Maps onto the nine error kinds of the error handling design: transport,
/// protocol, remote, circuit-open, validation, capacity, state, LLM, and
/// interrupt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    /// Network unreachable, connection refused, TLS failure, timeout.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Malformed JSON-RPC, unexpected schema, SSE framing error.
    #[error("protocol error: {message}")]
    Protocol {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// The remote agent returned `status=failed` or `Error:`-prefixed content.
    #[error("remote agent error: {message}")]
    Remote {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// A circuit breaker short-circuited the call without touching the network.
    #[error("circuit open for endpoint: {message}")]
    CircuitOpen {
        /// Human-readable error message (typically names the endpoint).
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Input exceeds length caps, contains malicious patterns, or is empty.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Pool exhausted, retry budget exceeded, or recursion limit reached.
    #[error("capacity exceeded: {message}")]
    Capacity {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Missing thread, corrupt state snapshot, schema mismatch after decode.
    #[error("state error: {message}")]
    State {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Provider error, truncation, non-JSON where JSON required, format
    /// validation failure.
    #[error("llm error: {message}")]
    Llm {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// User cancellation observed during execution.
    #[error("interrupted: {message}")]
    Interrupted {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// A JSON-RPC error response was received verbatim from a remote peer.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },
}

/// Convenience result type for fabric operations.
pub type FabricResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Create a `Transport` error with a message and no data.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `Protocol` error with a message and no data.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `Remote` error with a message and no data.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `CircuitOpen` error for the given endpoint.
    pub fn circuit_open(endpoint: impl Into<String>) -> Self {
        Self::CircuitOpen {
            message: endpoint.into(),
            data: None,
        }
    }

    /// Create a `Validation` error with a message and no data.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `Capacity` error with a message and no data.
    pub fn capacity(message: impl Into<String>) -> Self {
        Self::Capacity {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `State` error with a message and no data.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
            data: None,
        }
    }

    /// Create an `Llm` error with a message and no data.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            data: None,
        }
    }

    /// Create an `Interrupted` error with a message and no data.
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
            data: None,
        }
    }

    /// Returns the JSON-RPC / application error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            OrchestratorError::Transport { .. } => INTERNAL_ERROR,
            OrchestratorError::Protocol { .. } => INVALID_REQUEST,
            OrchestratorError::Remote { .. } => REMOTE_FAILURE,
            OrchestratorError::CircuitOpen { .. } => CIRCUIT_OPEN,
            OrchestratorError::Validation { .. } => VALIDATION_FAILED,
            OrchestratorError::Capacity { .. } => CAPACITY_EXCEEDED,
            OrchestratorError::State { .. } => STATE_ERROR,
            OrchestratorError::Llm { .. } => LLM_ERROR,
            OrchestratorError::Interrupted { .. } => INTERRUPTED,
            OrchestratorError::JsonRpc { code, .. } => *code,
        }
    }

    /// `true` for the error kinds whose propagation policy is to fail
    /// the individual task rather than aborting the whole plan.
    pub fn is_task_scoped(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Transport { .. }
                | OrchestratorError::CircuitOpen { .. }
                | OrchestratorError::Capacity { .. }
                | OrchestratorError::Remote { .. }
        )
    }
}

impl From<OrchestratorError> for JsonRpcError {
    fn from(err: OrchestratorError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            OrchestratorError::Transport { data, .. }
            | OrchestratorError::Protocol { data, .. }
            | OrchestratorError::Remote { data, .. }
            | OrchestratorError::CircuitOpen { data, .. }
            | OrchestratorError::Validation { data, .. }
            | OrchestratorError::Capacity { data, .. }
            | OrchestratorError::State { data, .. }
            | OrchestratorError::Llm { data, .. }
            | OrchestratorError::Interrupted { data, .. }
            | OrchestratorError::JsonRpc { data, .. } => data.clone(),
        };
        JsonRpcError {
            code,
            message,
            data,
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Protocol {
            message: err.to_string(),
            data: None,
        }
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OrchestratorError::transport(format!("timed out: {err}"))
        } else {
            OrchestratorError::transport(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for OrchestratorError {
    fn from(err: rusqlite::Error) -> Self {
        OrchestratorError::state(format!("kv store error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_spec() {
        assert_eq!(PARSE_ERROR, -32700);
        assert_eq!(INVALID_REQUEST, -32600);
        assert_eq!(METHOD_NOT_FOUND, -32601);
        assert_eq!(INVALID_PARAMS, -32602);
        assert_eq!(INTERNAL_ERROR, -32603);
        assert!(REMOTE_FAILURE >= 1000);
        assert!(CIRCUIT_OPEN >= 1000);
    }

    #[test]
    fn circuit_open_converts_to_json_rpc() {
        let err = OrchestratorError::circuit_open("https://agent.example/a2a");
        let rpc_err: JsonRpcError = err.into();
        assert_eq!(rpc_err.code, CIRCUIT_OPEN);
        assert!(rpc_err.message.contains("agent.example"));
    }

    #[test]
    fn task_scoped_kinds() {
        assert!(OrchestratorError::transport("x").is_task_scoped());
        assert!(OrchestratorError::circuit_open("x").is_task_scoped());
        assert!(OrchestratorError::capacity("x").is_task_scoped());
        assert!(OrchestratorError::remote("x").is_task_scoped());
        assert!(!OrchestratorError::validation("x").is_task_scoped());
        assert!(!OrchestratorError::state("x").is_task_scoped());
    }

    #[test]
    fn json_rpc_error_preserves_code() {
        let err = OrchestratorError::JsonRpc {
            code: -32001,
            message: "task not found".to_string(),
            data: None,
        };
        assert_eq!(err.code(), -32001);
    }

    #[test]
    fn validation_error_data_propagates_to_json_rpc() {
        let detail = serde_json::json!({"field": "instruction", "reason": "too long"});
        let err = OrchestratorError::Validation {
            message: "instruction exceeds length cap".to_string(),
            data: Some(detail.clone()),
        };
        let rpc_err: JsonRpcError = err.into();
        assert_eq!(rpc_err.code, VALIDATION_FAILED);
        assert_eq!(rpc_err.data, Some(detail));
    }
}
