//! Builder for the orchestrator's own [`AgentCard`], a fluent-setter
//! pattern adapted to the fabric's simplified card shape.

use crate::wire::AgentCard;
use std::collections::HashMap;

/// Builder for constructing [`AgentCard`] with sensible defaults.
///
/// ```
/// use agent_fabric::builders::AgentCardBuilder;
///
/// let card = AgentCardBuilder::new("orchestrator", "Multi-agent orchestration fabric", "0.1.0")
///     .with_endpoint("jsonrpc", "http://localhost:8000/a2a")
///     .with_capability("plan_execute")
///     .with_streaming()
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    name: String,
    description: String,
    version: String,
    capabilities: Vec<String>,
    endpoints: HashMap<String, String>,
    communication_modes: Vec<String>,
    metadata: serde_json::Value,
}

impl AgentCardBuilder {
    /// Start a builder with the required fields.
    pub fn new(name: impl Into<String>, description: impl Into<String>, version: impl Into<String>) -> Self {
        AgentCardBuilder {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            capabilities: Vec::new(),
            endpoints: HashMap::new(),
            communication_modes: vec!["sync".to_string()],
            metadata: serde_json::json!({}),
        }
    }

    /// Advertise a capability tag.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Bind a named endpoint role (e.g. `"jsonrpc"`, `"stream"`, `"ws"`) to a URL.
    pub fn with_endpoint(mut self, role: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(role.into(), url.into());
        self
    }

    /// Add `"streaming"` to the supported communication modes.
    pub fn with_streaming(mut self) -> Self {
        if !self.communication_modes.iter().any(|m| m == "streaming") {
            self.communication_modes.push("streaming".to_string());
        }
        self
    }

    /// Attach arbitrary metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Finalize the card.
    pub fn build(self) -> AgentCard {
        AgentCard {
            name: self.name,
            version: self.version,
            description: self.description,
            capabilities: self.capabilities,
            endpoints: self.endpoints,
            communication_modes: self.communication_modes,
            metadata: self.metadata,
        }
    }
}
