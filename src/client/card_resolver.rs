//! Resolves an agent's card from `GET /a2a/agent-card`, following the
//! same discovery logic as `client/card_resolver.rs`.

use crate::error::{FabricResult, OrchestratorError};
use crate::wire::AgentCard;

/// Fetches agent cards over plain HTTP GET.
pub struct CardResolver {
    client: reqwest::Client,
}

impl CardResolver {
    /// Build a resolver using `client` for requests.
    pub fn new(client: reqwest::Client) -> Self {
        CardResolver { client }
    }

    /// Fetch and decode the card served at `endpoint`.
    pub async fn resolve(&self, endpoint: &str) -> FabricResult<AgentCard> {
        let url = format!("{}/a2a/agent-card", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(OrchestratorError::from)?;

        if !response.status().is_success() {
            return Err(OrchestratorError::transport(format!(
                "agent card fetch failed for {endpoint}: {}",
                response.status()
            )));
        }

        response.json::<AgentCard>().await.map_err(OrchestratorError::from)
    }
}
