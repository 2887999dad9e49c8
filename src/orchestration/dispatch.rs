//! Single-message dispatch to one agent by identifier

use crate::agent::{AgentError, AgentPayload, Message, PROTOCOL_LABEL};
use crate::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No configured agent carries this identifier
    #[error("Agent {0} not found")]
    NotFound(String),

    #[error("Failed to send message to {agent_id}: {source}")]
    Downstream {
        agent_id: String,
        #[source]
        source: AgentError,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    pub echoed_message: String,
    pub result: AgentPayload,
    pub timestamp: DateTime<Utc>,
    pub protocol: &'static str,
}

/// Send `text` to the agent registered as `agent_id` and return its reply
///
/// Unknown identifiers are rejected before any network call is made.
pub async fn send_to_agent(
    registry: &AgentRegistry,
    agent_id: &str,
    text: &str,
) -> Result<DispatchResult, DispatchError> {
    let role = registry
        .resolve(agent_id)
        .ok_or_else(|| DispatchError::NotFound(agent_id.to_string()))?;

    let message = Message::user(text);
    tracing::debug!(
        "Dispatching {} to {} ({})",
        message.message_id,
        agent_id,
        role
    );

    let result = registry
        .client(role)
        .generate(std::slice::from_ref(&message))
        .await
        .map_err(|source| DispatchError::Downstream {
            agent_id: agent_id.to_string(),
            source,
        })?;

    Ok(DispatchResult {
        success: true,
        message: format!("Message sent to {} using {}", agent_id, PROTOCOL_LABEL),
        echoed_message: text.to_string(),
        result,
        timestamp: Utc::now(),
        protocol: PROTOCOL_LABEL,
    })
}
