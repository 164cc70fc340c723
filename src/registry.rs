//! Agent registry: capability-indexed directory of remote agents, with
//! health probing and atomic (temp + rename) persistence.
//!
//! Operations translated from `original_source/src/orchestrator/agent_registry.py`
//! onto a `tokio::sync::RwLock<HashMap<String, RegisteredAgent>>`, following
//! the same locking convention as `InMemoryTaskStore`.

use crate::client::A2AClient;
use crate::error::FabricResult;
use crate::wire::AgentCard;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a registered agent: `unknown -> {online, error,
/// offline} -> {online, error, offline}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Never probed.
    Unknown,
    /// Last probe succeeded.
    Online,
    /// Last probe failed at the transport layer.
    Offline,
    /// Last probe returned a protocol violation.
    Error,
}

/// A service-registry record for a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAgent {
    /// Unique agent name.
    pub name: String,
    /// Base endpoint URL.
    pub endpoint: String,
    /// Last-fetched agent card snapshot.
    pub card: AgentCard,
    /// Current health status.
    pub status: AgentStatus,
    /// RFC3339 timestamp of the last health check, if any.
    pub last_health_check: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct RegistryFile {
    agents: Vec<RegisteredAgent>,
}

/// Aggregate counts returned by [`AgentRegistry::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Total registered agents.
    pub total: usize,
    /// Agents currently `online`.
    pub online: usize,
    /// Agents currently `offline`.
    pub offline: usize,
    /// Agents currently `error`.
    pub error: usize,
    /// Agents never probed.
    pub unknown: usize,
    /// All distinct capability tags across the registry.
    pub capabilities: Vec<String>,
}

/// In-memory agent directory, persisted to `agent_registry.json`.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, RegisteredAgent>>,
    registration_order: RwLock<Vec<String>>,
    path: PathBuf,
    client: Arc<A2AClient>,
}

impl AgentRegistry {
    /// Load the registry from `path`, or start empty if it doesn't exist.
    pub async fn load(path: impl AsRef<Path>, client: Arc<A2AClient>) -> FabricResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut agents = HashMap::new();
        let mut order = Vec::new();

        if let Ok(bytes) = tokio::fs::read(&path).await {
            let file: RegistryFile = serde_json::from_slice(&bytes)?;
            for agent in file.agents {
                order.push(agent.name.clone());
                agents.insert(agent.name.clone(), agent);
            }
        }

        Ok(AgentRegistry {
            agents: RwLock::new(agents),
            registration_order: RwLock::new(order),
            path,
            client,
        })
    }

    async fn persist(&self) -> FabricResult<()> {
        let agents: Vec<RegisteredAgent> = self.agents.read().await.values().cloned().collect();
        let file = RegistryFile { agents };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await.map_err(|e| {
            crate::error::OrchestratorError::state(format!("registry write failed: {e}"))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            crate::error::OrchestratorError::state(format!("registry rename failed: {e}"))
        })?;
        Ok(())
    }

    /// Register (or re-register) an agent by fetching its card from `endpoint`.
    pub async fn register(&self, name: &str, endpoint: &str) -> FabricResult<RegisteredAgent> {
        let card = self.client.get_agent_card(endpoint).await?;
        let agent = RegisteredAgent {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            card,
            status: AgentStatus::Unknown,
            last_health_check: None,
        };

        let is_new = {
            let mut agents = self.agents.write().await;
            let is_new = !agents.contains_key(name);
            agents.insert(name.to_string(), agent.clone());
            is_new
        };
        if is_new {
            self.registration_order.write().await.push(name.to_string());
        }
        self.persist().await?;
        tracing::info!(agent = name, endpoint, "agent registered");
        Ok(agent)
    }

    /// Remove an agent from the registry.
    pub async fn deregister(&self, name: &str) -> FabricResult<()> {
        self.agents.write().await.remove(name);
        self.registration_order.write().await.retain(|n| n != name);
        self.persist().await?;
        Ok(())
    }

    /// Update an agent's health status in place.
    pub async fn update_status(&self, name: &str, status: AgentStatus) -> FabricResult<()> {
        {
            let mut agents = self.agents.write().await;
            if let Some(agent) = agents.get_mut(name) {
                agent.status = status;
                agent.last_health_check = Some(chrono::Utc::now().to_rfc3339());
            }
        }
        self.persist().await
    }

    /// Look up an agent by name.
    pub async fn get_by_name(&self, name: &str) -> Option<RegisteredAgent> {
        self.agents.read().await.get(name).cloned()
    }

    /// All agents whose card advertises `capability`.
    pub async fn find_by_capability(&self, capability: &str) -> Vec<RegisteredAgent> {
        self.agents
            .read()
            .await
            .values()
            .filter(|a| a.card.capabilities.iter().any(|c| c == capability))
            .cloned()
            .collect()
    }

    /// Best agent for a task: prefers `online` status with all required
    /// capabilities; falls back to keyword matching against name/
    /// capabilities/description; ties broken by registration order.
    pub async fn find_best_for(&self, description: &str, required_capabilities: &[String]) -> Option<RegisteredAgent> {
        let agents = self.agents.read().await;
        let order = self.registration_order.read().await;

        let mut candidates: Vec<&RegisteredAgent> = order
            .iter()
            .filter_map(|name| agents.get(name))
            .filter(|a| a.status == AgentStatus::Online)
            .filter(|a| {
                required_capabilities
                    .iter()
                    .all(|req| a.card.capabilities.iter().any(|c| c == req))
            })
            .collect();

        if !candidates.is_empty() {
            return candidates.drain(..).next().cloned();
        }

        let description_lower = description.to_lowercase();
        order
            .iter()
            .filter_map(|name| agents.get(name))
            .find(|a| {
                description_lower.contains(&a.name.to_lowercase())
                    || a.card
                        .capabilities
                        .iter()
                        .any(|c| description_lower.contains(&c.to_lowercase()))
                    || description_lower.contains(&a.card.description.to_lowercase())
            })
            .cloned()
    }

    /// Probe a single agent's card endpoint and update its status.
    pub async fn health_check(&self, name: &str) -> FabricResult<AgentStatus> {
        let endpoint = {
            let agents = self.agents.read().await;
            agents
                .get(name)
                .map(|a| a.endpoint.clone())
                .ok_or_else(|| crate::error::OrchestratorError::state(format!("unknown agent {name}")))?
        };

        let status = match self.client.get_agent_card(&endpoint).await {
            Ok(_) => AgentStatus::Online,
            Err(crate::error::OrchestratorError::Transport { .. }) => AgentStatus::Offline,
            Err(_) => AgentStatus::Error,
        };
        self.update_status(name, status).await?;
        Ok(status)
    }

    /// Probe every registered agent concurrently, persisting once at the end.
    pub async fn health_check_all(&self) -> FabricResult<()> {
        let names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        let checks = names.into_iter().map(|name| {
            let this = self;
            async move { this.health_check(&name).await }
        });
        futures::future::join_all(checks).await;
        Ok(())
    }

    /// Register every endpoint in `endpoints`, keyed by discovered agent name.
    pub async fn discover(&self, endpoints: &[String]) -> FabricResult<Vec<RegisteredAgent>> {
        let mut discovered = Vec::new();
        for endpoint in endpoints {
            let card = self.client.get_agent_card(endpoint).await?;
            let agent = self.register(&card.name, endpoint).await?;
            discovered.push(agent);
        }
        Ok(discovered)
    }

    /// Aggregate counts across the registry.
    pub async fn stats(&self) -> RegistryStats {
        let agents = self.agents.read().await;
        let mut caps: Vec<String> = agents
            .values()
            .flat_map(|a| a.card.capabilities.clone())
            .collect();
        caps.sort();
        caps.dedup();

        RegistryStats {
            total: agents.len(),
            online: agents.values().filter(|a| a.status == AgentStatus::Online).count(),
            offline: agents.values().filter(|a| a.status == AgentStatus::Offline).count(),
            error: agents.values().filter(|a| a.status == AgentStatus::Error).count(),
            unknown: agents.values().filter(|a| a.status == AgentStatus::Unknown).count(),
            capabilities: caps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, caps: &[&str], status: AgentStatus) -> RegisteredAgent {
        RegisteredAgent {
            name: name.to_string(),
            endpoint: format!("https://{name}/a2a"),
            card: AgentCard {
                name: name.to_string(),
                version: "1.0".to_string(),
                description: format!("the {name} agent"),
                capabilities: caps.iter().map(|c| c.to_string()).collect(),
                endpoints: HashMap::new(),
                communication_modes: vec!["sync".to_string()],
                metadata: serde_json::json!({}),
            },
            status,
            last_health_check: None,
        }
    }

    #[test]
    fn find_best_for_prefers_online_with_required_caps() {
        let mut agents = HashMap::new();
        agents.insert("salesforce".to_string(), agent("salesforce", &["crm"], AgentStatus::Online));
        agents.insert("jira".to_string(), agent("jira", &["tickets"], AgentStatus::Offline));

        let online: Vec<&RegisteredAgent> = ["salesforce", "jira"]
            .iter()
            .filter_map(|n| agents.get(*n))
            .filter(|a| a.status == AgentStatus::Online)
            .filter(|a| a.card.capabilities.iter().any(|c| c == "crm"))
            .collect();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].name, "salesforce");
    }

    #[test]
    fn stats_dedups_capabilities() {
        let mut caps = vec!["crm".to_string(), "crm".to_string(), "tickets".to_string()];
        caps.sort();
        caps.dedup();
        assert_eq!(caps, vec!["crm".to_string(), "tickets".to_string()]);
    }
}
