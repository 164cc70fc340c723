//! High-level A2A client: `get_agent_card`, `process_task`, `stream_task`.
//! Mirrors the `get_card`/`send_message`/`send_message_stream` surface
//! one-for-one, retargeted at the fabric's simpler wire shapes.

use super::card_resolver::CardResolver;
use super::sse::SseStream;
use super::transport::JsonRpcTransport;
use crate::breaker::{CircuitBreaker, SharedBreaker};
use crate::config::{BreakerConfig, PoolConfig};
use crate::error::FabricResult;
use crate::pool::ConnectionPool;
use crate::wire::{A2ATask, AgentCard, ProcessTaskResult};
use std::sync::Arc;
use uuid::Uuid;

/// Client used by the registry, executor, and CLI to talk to remote agents.
pub struct A2AClient {
    pool: Arc<ConnectionPool>,
    breaker: SharedBreaker,
    transport: JsonRpcTransport,
}

impl A2AClient {
    /// Build a client with its own pool and breaker.
    pub fn new(pool_config: PoolConfig, breaker_config: BreakerConfig) -> Self {
        let pool = Arc::new(ConnectionPool::new(pool_config));
        let breaker: SharedBreaker = Arc::new(CircuitBreaker::new(breaker_config));
        let transport = JsonRpcTransport::new(pool.clone(), breaker.clone());
        A2AClient {
            pool,
            breaker,
            transport,
        }
    }

    /// `GET /a2a/agent-card`.
    pub async fn get_agent_card(&self, endpoint: &str) -> FabricResult<AgentCard> {
        let guard = self.pool.acquire(endpoint).await?;
        let resolver = CardResolver::new(guard.client().clone());
        resolver.resolve(endpoint).await
    }

    /// `POST /a2a` with JSON-RPC method `process_task`.
    pub async fn process_task(&self, endpoint: &str, task: A2ATask) -> FabricResult<ProcessTaskResult> {
        let id = Uuid::new_v4().to_string();
        let params = serde_json::json!({"task": task});
        let result = self.transport.call(endpoint, "process_task", params, &id).await?;
        serde_json::from_value(result).map_err(crate::error::OrchestratorError::from)
    }

    /// `POST /a2a/stream`, `Accept: text/event-stream`. Finite,
    /// non-restartable; drop the stream to cancel.
    pub async fn stream_task(&self, endpoint: &str, task: A2ATask) -> FabricResult<SseStream> {
        self.breaker.before_call(endpoint).await?;
        let guard = self.pool.acquire(endpoint).await?;
        let url = format!("{}/a2a/stream", endpoint.trim_end_matches('/'));
        let body = serde_json::json!({"task": task});
        SseStream::connect(guard.client().clone(), url, body)
    }

    /// Shared breaker, exposed so the registry's `health_check` can read
    /// per-endpoint state if needed.
    pub fn breaker(&self) -> &SharedBreaker {
        &self.breaker
    }
}
