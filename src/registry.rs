//! Agent registry
//!
//! Maps each [`AgentRole`] to exactly one endpoint and client, and each agent
//! identifier back to its role. Built once at startup and shared read-only
//! for the lifetime of the relay.

use crate::agent::{AgentClient, AgentEndpoint, AgentError, AgentRole, MastraAgentClient};
use crate::config::{AgentsConfig, ClientConfig};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No endpoint configured for role '{0}'")]
    MissingRole(AgentRole),

    #[error("Role '{0}' is configured more than once")]
    DuplicateRole(AgentRole),

    #[error("Agent id '{agent_id}' is shared by '{first}' and '{second}'")]
    DuplicateAgentId {
        agent_id: String,
        first: AgentRole,
        second: AgentRole,
    },

    #[error("Agent id for role '{0}' is empty")]
    EmptyAgentId(AgentRole),

    #[error("Failed to create client for role '{role}': {source}")]
    Client {
        role: AgentRole,
        #[source]
        source: AgentError,
    },
}

struct RegisteredAgent {
    endpoint: AgentEndpoint,
    client: Arc<dyn AgentClient>,
}

pub struct AgentRegistry {
    // Indexed in `AgentRole::ALL` order
    agents: Vec<RegisteredAgent>,
    by_agent_id: HashMap<String, AgentRole>,
}

impl AgentRegistry {
    /// Build a registry from explicit endpoint/client pairs
    ///
    /// Every role must appear exactly once and agent ids must be distinct.
    pub fn new(entries: Vec<(AgentEndpoint, Arc<dyn AgentClient>)>) -> Result<Self, RegistryError> {
        let mut slots: HashMap<AgentRole, RegisteredAgent> = HashMap::new();
        let mut by_agent_id: HashMap<String, AgentRole> = HashMap::new();

        for (endpoint, client) in entries {
            let role = endpoint.role;
            if endpoint.agent_id.trim().is_empty() {
                return Err(RegistryError::EmptyAgentId(role));
            }
            if slots.contains_key(&role) {
                return Err(RegistryError::DuplicateRole(role));
            }
            if let Some(&first) = by_agent_id.get(&endpoint.agent_id) {
                return Err(RegistryError::DuplicateAgentId {
                    agent_id: endpoint.agent_id.clone(),
                    first,
                    second: role,
                });
            }
            by_agent_id.insert(endpoint.agent_id.clone(), role);
            slots.insert(role, RegisteredAgent { endpoint, client });
        }

        let mut agents = Vec::with_capacity(AgentRole::ALL.len());
        for role in AgentRole::ALL {
            let agent = slots.remove(&role).ok_or(RegistryError::MissingRole(role))?;
            agents.push(agent);
        }

        Ok(Self { agents, by_agent_id })
    }

    /// Build a registry with one HTTP client per configured agent server
    pub fn from_config(
        agents: &AgentsConfig,
        client: &ClientConfig,
    ) -> Result<Self, RegistryError> {
        let mut entries: Vec<(AgentEndpoint, Arc<dyn AgentClient>)> = Vec::new();
        for role in AgentRole::ALL {
            let server = agents.get(role);
            let endpoint = AgentEndpoint::new(role, &server.base_url, &server.agent_id);
            let http: Arc<dyn AgentClient> = Arc::new(
                MastraAgentClient::new(&endpoint.base_url, &endpoint.agent_id, client.timeout())
                    .map_err(|source| RegistryError::Client { role, source })?,
            );
            tracing::debug!(
                "Registered {} agent '{}' at {}",
                role,
                endpoint.agent_id,
                endpoint.base_url
            );
            entries.push((endpoint, http));
        }
        Self::new(entries)
    }

    fn slot(&self, role: AgentRole) -> &RegisteredAgent {
        let index = AgentRole::ALL
            .iter()
            .position(|r| *r == role)
            .unwrap_or_default();
        &self.agents[index]
    }

    pub fn endpoint(&self, role: AgentRole) -> &AgentEndpoint {
        &self.slot(role).endpoint
    }

    pub fn client(&self, role: AgentRole) -> Arc<dyn AgentClient> {
        Arc::clone(&self.slot(role).client)
    }

    /// Role owning `agent_id`, if any
    pub fn resolve(&self, agent_id: &str) -> Option<AgentRole> {
        self.by_agent_id.get(agent_id).copied()
    }

    pub fn roles(&self) -> impl Iterator<Item = AgentRole> + '_ {
        self.agents.iter().map(|a| a.endpoint.role)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &AgentEndpoint> {
        self.agents.iter().map(|a| &a.endpoint)
    }
}
