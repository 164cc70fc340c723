//! Per-endpoint circuit breaker: closed/open/half-open, matching the
//! short-critical-section `Mutex<State>` pattern used in
//! `server/task_updater.rs`'s `Mutex<UpdaterState>`.

use crate::config::BreakerConfig;
use crate::error::{FabricResult, OrchestratorError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through normally.
    Closed,
    /// Calls fail fast without touching the network.
    Open,
    /// A limited number of probe calls are allowed through.
    HalfOpen,
}

struct EndpointBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

impl EndpointBreaker {
    fn new() -> Self {
        EndpointBreaker {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_calls: 0,
        }
    }
}

/// Circuit breaker registry keyed by endpoint.
pub struct CircuitBreaker {
    config: BreakerConfig,
    endpoints: Mutex<HashMap<String, EndpointBreaker>>,
}

impl CircuitBreaker {
    /// Build a breaker registry using `config` for every endpoint.
    pub fn new(config: BreakerConfig) -> Self {
        CircuitBreaker {
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Called before issuing a call to `endpoint`. Returns an error if the
    /// breaker is open; transitions `Open` -> `HalfOpen` once `open_timeout`
    /// has elapsed.
    pub async fn before_call(&self, endpoint: &str) -> FabricResult<()> {
        let mut guard = self.endpoints.lock().await;
        let breaker = guard.entry(endpoint.to_string()).or_insert_with(EndpointBreaker::new);

        match breaker.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => {
                if breaker.half_open_calls < self.config.half_open_max_calls {
                    breaker.half_open_calls += 1;
                    Ok(())
                } else {
                    Err(OrchestratorError::circuit_open(endpoint))
                }
            }
            BreakerState::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    tracing::info!(endpoint, "circuit_breaker_half_open");
                    breaker.state = BreakerState::HalfOpen;
                    breaker.half_open_calls = 1;
                    Ok(())
                } else {
                    Err(OrchestratorError::circuit_open(endpoint))
                }
            }
        }
    }

    /// Record a successful call against `endpoint`.
    pub async fn on_success(&self, endpoint: &str) {
        let mut guard = self.endpoints.lock().await;
        let breaker = guard.entry(endpoint.to_string()).or_insert_with(EndpointBreaker::new);
        if breaker.state != BreakerState::Closed {
            tracing::info!(endpoint, "circuit_breaker_closed");
        }
        breaker.state = BreakerState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
        breaker.half_open_calls = 0;
    }

    /// Record a failed call against `endpoint`. Trips the breaker open on
    /// threshold breach (`Closed`) or immediately (`HalfOpen`).
    pub async fn on_failure(&self, endpoint: &str) {
        let mut guard = self.endpoints.lock().await;
        let breaker = guard.entry(endpoint.to_string()).or_insert_with(EndpointBreaker::new);

        match breaker.state {
            BreakerState::HalfOpen => {
                tracing::info!(endpoint, "circuit_breaker_opened");
                breaker.state = BreakerState::Open;
                breaker.opened_at = Some(Instant::now());
                breaker.half_open_calls = 0;
            }
            BreakerState::Closed => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= self.config.failure_threshold {
                    tracing::info!(endpoint, "circuit_breaker_opened");
                    breaker.state = BreakerState::Open;
                    breaker.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Current state for `endpoint`, `Closed` if never observed.
    pub async fn state(&self, endpoint: &str) -> BreakerState {
        self.endpoints
            .lock()
            .await
            .get(endpoint)
            .map(|b| b.state)
            .unwrap_or(BreakerState::Closed)
    }
}

/// Shared handle, suitable for cloning across tasks.
pub type SharedBreaker = Arc<CircuitBreaker>;
