//! Registry of specialist agents.
//!
//! Built once at startup and read-only afterwards, so it can be shared
//! by concurrent requests without locking.

use crate::agent::client::{AgentClient, HttpAgentClient};
use crate::config::{AgentConfig, ClientConfig};
use crate::models::AgentName;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent '{0}' is registered more than once")]
    DuplicateAgent(AgentName),

    #[error("agent '{agent}' has an invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        agent: AgentName,
        url: String,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

struct RegistryEntry {
    name: AgentName,
    /// `None` when the agent has no endpoint configured.
    client: Option<Arc<dyn AgentClient>>,
}

/// Ordered set of configured agents, enabled or not.
#[derive(Default)]
pub struct AgentRegistry {
    entries: Vec<RegistryEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration, one HTTP client per enabled agent.
    pub fn from_config(agents: &[AgentConfig], client: &ClientConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder().build()?;
        let mut registry = Self::new();

        for agent in agents {
            let name = AgentName::new(agent.name.trim());
            let Some(url) = agent.url.as_deref() else {
                debug!(agent = %name, "No endpoint configured, agent disabled");
                registry.disable(name)?;
                continue;
            };

            validate_endpoint(&name, url)?;
            let timeout =
                Duration::from_secs(agent.timeout_seconds.unwrap_or(client.timeout_seconds));
            let client = HttpAgentClient::new(url, timeout, http_client.clone());
            info!(
                agent = %name,
                endpoint = client.endpoint(),
                timeout = ?timeout,
                "Registered agent"
            );
            registry.register(name, Arc::new(client))?;
        }

        Ok(registry)
    }

    /// Add an enabled agent at the end of the dispatch order.
    pub fn register(
        &mut self,
        name: impl Into<AgentName>,
        client: Arc<dyn AgentClient>,
    ) -> Result<(), RegistryError> {
        self.push(name.into(), Some(client))
    }

    /// Record a configured agent that has no endpoint.
    pub fn disable(&mut self, name: impl Into<AgentName>) -> Result<(), RegistryError> {
        self.push(name.into(), None)
    }

    fn push(
        &mut self,
        name: AgentName,
        client: Option<Arc<dyn AgentClient>>,
    ) -> Result<(), RegistryError> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(RegistryError::DuplicateAgent(name));
        }
        self.entries.push(RegistryEntry { name, client });
        Ok(())
    }

    /// Enabled agents in registry order. Disabled agents are not listed.
    pub fn lookup(&self) -> impl Iterator<Item = (&AgentName, &Arc<dyn AgentClient>)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.client.as_ref().map(|client| (&e.name, client)))
    }

    /// Every configured agent with whether it is enabled, in registry order.
    pub fn roster(&self) -> impl Iterator<Item = (&AgentName, bool)> + '_ {
        self.entries.iter().map(|e| (&e.name, e.client.is_some()))
    }

    pub fn enabled_count(&self) -> usize {
        self.lookup().count()
    }
}

fn validate_endpoint(agent: &AgentName, url: &str) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidEndpoint {
        agent: agent.clone(),
        url: url.to_string(),
        reason,
    };

    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
