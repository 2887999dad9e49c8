//! Agent discovery and the communication self-test
//!
//! Both operations fan out over every configured agent and never fail as a
//! whole: a broken agent becomes an `offline`/`failed` entry in the result.

use crate::agent::{AgentEndpoint, AgentPayload, AgentRole, PROTOCOL_LABEL};
use crate::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

/// Liveness and details of one agent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub role: AgentRole,
    pub url: String,
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub protocol: &'static str,
}

impl DiscoveryResult {
    fn online(endpoint: &AgentEndpoint, agent: AgentPayload) -> Self {
        Self {
            role: endpoint.role,
            url: endpoint.base_url.clone(),
            agent_id: endpoint.agent_id.clone(),
            status: AgentStatus::Online,
            agent: Some(agent),
            error: None,
            protocol: PROTOCOL_LABEL,
        }
    }

    fn offline(endpoint: &AgentEndpoint, error: String) -> Self {
        Self {
            role: endpoint.role,
            url: endpoint.base_url.clone(),
            agent_id: endpoint.agent_id.clone(),
            status: AgentStatus::Offline,
            agent: None,
            error: Some(error),
            protocol: PROTOCOL_LABEL,
        }
    }
}

/// Query every configured agent for its details
///
/// Probes run concurrently; the output holds exactly one entry per role in
/// registry order.
pub async fn discover(registry: &AgentRegistry) -> Vec<DiscoveryResult> {
    let probes = registry.endpoints().map(|endpoint| async move {
        let client = registry.client(endpoint.role);
        match client.details().await {
            Ok(details) => DiscoveryResult::online(endpoint, details),
            Err(e) => {
                tracing::warn!("Agent discovery failed for {}: {}", endpoint.role, e);
                DiscoveryResult::offline(endpoint, e.to_string())
            }
        }
    });

    futures::future::join_all(probes).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub agent: AgentRole,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_details: Option<AgentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub protocol: &'static str,
}

/// Outcome of probing every agent once
#[derive(Debug, Clone, Serialize)]
pub struct CommunicationReport {
    pub test: &'static str,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
    pub protocol: &'static str,
}

impl CommunicationReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.status == ProbeStatus::Success)
    }
}

/// Probe each agent's detail endpoint in pipeline order
///
/// A failing agent is recorded and the remaining agents are still probed.
pub async fn test_communication(registry: &AgentRegistry) -> CommunicationReport {
    tracing::info!("Testing agent communication");

    let mut results = Vec::with_capacity(AgentRole::PIPELINE_ORDER.len());
    for role in AgentRole::PIPELINE_ORDER {
        let result = match registry.client(role).details().await {
            Ok(details) => ProbeResult {
                agent: role,
                status: ProbeStatus::Success,
                agent_details: Some(details),
                error: None,
                protocol: PROTOCOL_LABEL,
            },
            Err(e) => {
                tracing::warn!("Communication test failed for {}: {}", role, e);
                ProbeResult {
                    agent: role,
                    status: ProbeStatus::Failed,
                    agent_details: None,
                    error: Some(e.to_string()),
                    protocol: PROTOCOL_LABEL,
                }
            }
        };
        results.push(result);
    }

    CommunicationReport {
        test: "mastra-cloud-communication",
        timestamp: Utc::now(),
        results,
        protocol: PROTOCOL_LABEL,
    }
}
