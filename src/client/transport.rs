//! HTTP transport: JSON-RPC request/response over the connection pool,
//! guarded by the circuit breaker. Follows the same `reqwest::Client`
//! construction (with timeouts) as `client/transport.rs`, generalized to
//! route through `ConnectionPool`/`CircuitBreaker`.

use crate::breaker::SharedBreaker;
use crate::error::{FabricResult, OrchestratorError};
use crate::pool::ConnectionPool;
use crate::wire::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use std::sync::Arc;

/// Sends JSON-RPC requests to a remote agent's `/a2a` endpoint.
pub struct JsonRpcTransport {
    pool: Arc<ConnectionPool>,
    breaker: SharedBreaker,
}

impl JsonRpcTransport {
    /// Build a transport sharing the given pool and breaker.
    pub fn new(pool: Arc<ConnectionPool>, breaker: SharedBreaker) -> Self {
        JsonRpcTransport { pool, breaker }
    }

    /// POST a JSON-RPC request to `endpoint` and decode the response.
    pub async fn call(&self, endpoint: &str, method: &str, params: serde_json::Value, id: &str) -> FabricResult<serde_json::Value> {
        self.breaker.before_call(endpoint).await?;

        let result = self.do_call(endpoint, method, params, id).await;
        match &result {
            Ok(_) => self.breaker.on_success(endpoint).await,
            Err(e) if e.is_task_scoped() => self.breaker.on_failure(endpoint).await,
            Err(_) => {}
        }
        result
    }

    async fn do_call(&self, endpoint: &str, method: &str, params: serde_json::Value, id: &str) -> FabricResult<serde_json::Value> {
        let request = JsonRpcRequest::new(method, params, JsonRpcId::String(id.to_string()));
        let guard = self.pool.acquire(endpoint).await?;

        let url = format!("{}/a2a", endpoint.trim_end_matches('/'));
        let response = guard
            .client()
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(OrchestratorError::from)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(OrchestratorError::transport(format!(
                "non-2xx response from {endpoint}: {status}"
            )));
        }

        let body: JsonRpcResponse = response.json().await.map_err(OrchestratorError::from)?;
        if let Some(err) = body.error {
            return Err(OrchestratorError::JsonRpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        body.result
            .ok_or_else(|| OrchestratorError::protocol("JSON-RPC response missing both result and error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreaker;
    use crate::config::{BreakerConfig, PoolConfig};

    #[tokio::test]
    async fn circuit_open_skips_network() {
        let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        }));
        breaker.on_failure("https://nope.invalid").await;
        let transport = JsonRpcTransport::new(pool, breaker);
        let result = transport
            .call("https://nope.invalid", "process_task", serde_json::json!({}), "1")
            .await;
        assert!(matches!(result, Err(OrchestratorError::CircuitOpen { .. })));
    }
}
