//! # agent-fabric — a multi-agent orchestration fabric
//!
//! Coordinates a user's natural-language requests across a fleet of
//! specialized remote agents (CRM, issue-tracking, ITSM, …) through a
//! uniform Agent-to-Agent (A2A) wire protocol. A central orchestrator
//! accepts a free-form request, decomposes it into an ordered execution
//! plan of discrete tasks, dispatches each task to the best-fit remote
//! agent, streams real-time progress to the caller, honors human-in-the-loop
//! interrupts, and persists conversation state for resumable, long-lived
//! threads.
//!
//! ## Layers
//!
//! - The **plan-and-execute state machine**
//!   ([`orchestrator::Planner`], [`orchestrator::Executor`],
//!   [`orchestrator::Replanner`], [`orchestrator::Summarizer`]), with
//!   interrupt, resume, and replacement semantics handled by
//!   [`orchestrator::InterruptManager`].
//! - The **A2A protocol layer**: JSON-RPC request/response and SSE streaming
//!   ([`wire`], [`client::A2AClient`]), a connection pool ([`pool::ConnectionPool`]),
//!   and a circuit breaker ([`breaker::CircuitBreaker`]).
//! - **Ambient infrastructure**: the agent registry ([`registry::AgentRegistry`]),
//!   a persistent KV store ([`store::KvStore`]), an LLM gateway abstraction
//!   ([`llm::LlmGateway`]), a structured-memory extractor ([`memory`]), and
//!   tracing setup ([`observability`]).
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | HTTP client for calling remote A2A agents (reqwest + SSE) |
//! | `server` | yes     | JSON-RPC/SSE/WebSocket surface for hosting the orchestrator (axum) |
//! | `full`   | no      | Enable all features |

pub mod breaker;
pub mod builders;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod store;
pub mod wire;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

/// Re-exports the types most callers need, without requiring individual
/// `use agent_fabric::module::Type` imports.
pub mod prelude {
    pub use crate::builders::AgentCardBuilder;
    pub use crate::config::{BreakerConfig, Cli, LlmConfig, OrchestratorConfig, PoolConfig};
    pub use crate::conversation::{smart_preserve, trim_for_context};
    pub use crate::error::{FabricResult, OrchestratorError};
    pub use crate::llm::{InvokeOptions, LlmGateway, LlmMessage};
    pub use crate::orchestrator::{
        drive_one_step, ExecutionPlan, ExecutionTask, InterruptData, InterruptManager, PlanExecuteState, TaskStatus,
        TurnContext,
    };
    pub use crate::registry::AgentRegistry;
    pub use crate::store::KvStore;
    pub use crate::wire::{A2AArtifact, A2ATask, AgentCard, JsonRpcRequest, JsonRpcResponse, SseEvent};

    #[cfg(feature = "client")]
    pub use crate::client::A2AClient;

    #[cfg(feature = "server")]
    pub use crate::server::{router, AppState};
}
