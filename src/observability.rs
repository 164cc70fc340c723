//! Observability (C17): tracing subscriber setup and the registry-stats
//! snapshot used for operational dashboards. Log-level wiring uses the
//! standard `tracing_subscriber::fmt()` builder pattern; the stats shape
//! is grounded on `original_source/src/orchestrator/agent_registry.py`'s
//! `get_registry_stats`, and cost/latency event names follow
//! `background_tasks.py`'s `logger.track_cost` / `logger.info(...)` calls.

use crate::registry::AgentRegistry;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `log_level` is an `EnvFilter` directive string (e.g. `"info"`,
/// `"agent_fabric=debug,warn"`); when `log_dir` is set, logs are additionally
/// written as newline-delimited JSON to a daily-rotated file under that
/// directory (non-blocking), returning the guard the caller must hold for
/// the file writer's lifetime.
pub fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "orchestrator.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .init();
            Some(guard)
        }
        None => {
            fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Estimate token count the way `background_tasks.py`'s cost tracker does:
/// roughly four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Service-mesh observability snapshot for the agent registry, mirroring
/// `get_registry_stats`'s per-capability counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistrySnapshot {
    /// Total registered agents.
    pub total_agents: usize,
    /// Agents currently online.
    pub online_agents: usize,
    /// Agents currently offline.
    pub offline_agents: usize,
    /// Agents in an error state.
    pub error_agents: usize,
    /// Agents whose status has never been probed.
    pub unknown_agents: usize,
    /// Number of registered agents exposing each capability.
    pub agents_by_capability: std::collections::BTreeMap<String, usize>,
}

/// Build a [`RegistrySnapshot`] from the live registry, refining
/// [`crate::registry::RegistryStats`]'s flat capability list into per-capability
/// agent counts for dashboards.
pub async fn registry_snapshot(registry: &AgentRegistry) -> RegistrySnapshot {
    let stats = registry.stats().await;
    let mut agents_by_capability = std::collections::BTreeMap::new();
    for capability in &stats.capabilities {
        let count = registry.find_by_capability(capability).await.len();
        agents_by_capability.insert(capability.clone(), count);
    }

    RegistrySnapshot {
        total_agents: stats.total,
        online_agents: stats.online,
        offline_agents: stats.offline,
        error_agents: stats.error,
        unknown_agents: stats.unknown,
        agents_by_capability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_floors_to_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn registry_snapshot_serializes() {
        let snapshot = RegistrySnapshot {
            total_agents: 3,
            online_agents: 2,
            offline_agents: 1,
            error_agents: 0,
            unknown_agents: 0,
            agents_by_capability: [("salesforce_operations".to_string(), 2)].into_iter().collect(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["total_agents"], 3);
    }

    #[tokio::test]
    async fn registry_snapshot_reflects_empty_registry() {
        let client = std::sync::Arc::new(crate::client::A2AClient::new(
            crate::config::PoolConfig::default(),
            crate::config::BreakerConfig::default(),
        ));
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("agent_registry_snapshot_{unique}.json"));
        let registry = AgentRegistry::load(&path, client).await.unwrap();

        let snapshot = registry_snapshot(&registry).await;
        assert_eq!(snapshot.total_agents, 0);
        assert!(snapshot.agents_by_capability.is_empty());
    }
}
