//! Connection pool: one long-lived `reqwest::Client` per endpoint, capped
//! in-flight request count, closed on shutdown.
//!
//! Mirrors the `Mutex<HashMap<...>>` client-registry pattern used in
//! `server/event_queue.rs` and `server/request_handler.rs`, generalized to
//! key on remote endpoint instead of task id.

use crate::config::PoolConfig;
use crate::error::{FabricResult, OrchestratorError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

struct PooledClient {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
}

/// Endpoint-keyed pool of HTTP clients with per-endpoint in-flight quotas.
pub struct ConnectionPool {
    config: PoolConfig,
    clients: RwLock<HashMap<String, PooledClient>>,
}

impl ConnectionPool {
    /// Build a pool using the given config for every endpoint it creates
    /// clients for.
    pub fn new(config: PoolConfig) -> Self {
        ConnectionPool {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_create(&self, endpoint: &str) -> FabricResult<Arc<Semaphore>> {
        if let Some(entry) = self.clients.read().await.get(endpoint) {
            return Ok(entry.in_flight.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get(endpoint) {
            return Ok(entry.in_flight.clone());
        }

        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.total_timeout)
            .build()
            .map_err(OrchestratorError::from)?;
        let in_flight = Arc::new(Semaphore::new(self.config.max_in_flight));
        tracing::debug!(endpoint, "connection pool: created client");
        clients.insert(
            endpoint.to_string(),
            PooledClient {
                client,
                in_flight: in_flight.clone(),
            },
        );
        Ok(in_flight)
    }

    /// Acquire a client + in-flight permit for `endpoint`. The returned
    /// guard holds the permit; drop it to release the slot.
    pub async fn acquire(&self, endpoint: &str) -> FabricResult<PoolGuard> {
        let semaphore = self.get_or_create(endpoint).await?;
        let permit = semaphore.try_acquire_owned().map_err(|_| {
            tracing::warn!(endpoint, "connection pool: quota exhausted");
            OrchestratorError::capacity(format!("pool quota exhausted for endpoint {endpoint}"))
        })?;

        let client = self
            .clients
            .read()
            .await
            .get(endpoint)
            .map(|e| e.client.clone())
            .expect("client inserted by get_or_create");

        Ok(PoolGuard {
            client,
            _permit: permit,
        })
    }

    /// Drop every cached client, releasing pooled connections. Called on
    /// shutdown.
    pub async fn close(&self) {
        self.clients.write().await.clear();
    }
}

/// A held client + in-flight permit. Dropping it frees the pool slot.
pub struct PoolGuard {
    client: reqwest::Client,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl PoolGuard {
    /// Borrow the underlying HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
