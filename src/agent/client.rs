//! Downstream agent client
//!
//! [`AgentClient`] is the seam between the relay and a hosted agent. The
//! production implementation speaks the hosted agent server's REST and A2A
//! JSON-RPC contract over `reqwest`; tests substitute in-process fakes.

use super::error::AgentError;
use super::message::{AgentPayload, Message};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Operations every hosted agent endpoint supports
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Fetch the agent's description (name, instructions, tools, ...)
    async fn details(&self) -> Result<AgentPayload, AgentError>;

    /// Ask the agent to generate a reply to the given conversation
    async fn generate(&self, messages: &[Message]) -> Result<AgentPayload, AgentError>;

    /// Fetch the agent's A2A card
    async fn card(&self) -> Result<AgentPayload, AgentError>;

    /// Send one A2A message and wait for the agent's reply
    async fn send_message(&self, message: Message) -> Result<AgentPayload, AgentError>;

    /// Open an A2A streaming exchange and read it to completion
    async fn send_streaming_message(&self, message: Message) -> Result<AgentPayload, AgentError>;
}

/// Wire shape of a conversation turn for the `generate` endpoint
#[derive(Debug, Serialize)]
struct GenerateMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    messages: Vec<GenerateMessage<'a>>,
}

/// Client for an agent hosted on a Mastra-compatible agent server
pub struct MastraAgentClient {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
}

impl MastraAgentClient {
    /// Create a client bound to `base_url` for the agent exported as `agent_id`
    ///
    /// With `timeout` unset, requests use reqwest's defaults.
    pub fn new(
        base_url: &str,
        agent_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::Other(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_id: agent_id.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn agent_url(&self) -> String {
        format!("{}/api/agents/{}", self.base_url, self.agent_id)
    }

    fn a2a_url(&self) -> String {
        format!("{}/a2a/{}", self.base_url, self.agent_id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(AgentError::from_http_status(status, error_text))
    }

    async fn read_json(response: reqwest::Response) -> Result<AgentPayload, AgentError> {
        let response = Self::check(response).await?;
        let body = response.text().await.map_err(AgentError::from_network_error)?;
        serde_json::from_str(&body).map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    async fn get_json(&self, url: &str) -> Result<AgentPayload, AgentError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AgentError::from_network_error)?;
        Self::read_json(response).await
    }

    fn rpc_body(method: &str, message: &Message) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": { "message": message },
        })
    }

    /// Unwrap a JSON-RPC response envelope into its `result`
    fn rpc_result(envelope: AgentPayload) -> Result<AgentPayload, AgentError> {
        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            return Err(AgentError::Rpc {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(-32603),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(envelope.get("result").cloned().unwrap_or(AgentPayload::Null))
    }
}

#[async_trait]
impl AgentClient for MastraAgentClient {
    async fn details(&self) -> Result<AgentPayload, AgentError> {
        self.get_json(&self.agent_url()).await
    }

    async fn generate(&self, messages: &[Message]) -> Result<AgentPayload, AgentError> {
        let url = format!("{}/generate", self.agent_url());
        let body = GenerateRequest {
            messages: messages
                .iter()
                .map(|m| GenerateMessage {
                    role: &m.role,
                    content: m.text(),
                })
                .collect(),
        };

        tracing::debug!("POST {} ({} messages)", url, body.messages.len());
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AgentError::from_network_error)?;
        Self::read_json(response).await
    }

    async fn card(&self) -> Result<AgentPayload, AgentError> {
        let url = format!("{}/.well-known/{}/agent-card.json", self.base_url, self.agent_id);
        self.get_json(&url).await
    }

    async fn send_message(&self, message: Message) -> Result<AgentPayload, AgentError> {
        let response = self
            .client
            .post(self.a2a_url())
            .json(&Self::rpc_body("message/send", &message))
            .send()
            .await
            .map_err(AgentError::from_network_error)?;
        let envelope = Self::read_json(response).await?;
        Self::rpc_result(envelope)
    }

    async fn send_streaming_message(&self, message: Message) -> Result<AgentPayload, AgentError> {
        let response = self
            .client
            .post(self.a2a_url())
            .header("Accept", "text/event-stream")
            .json(&Self::rpc_body("message/stream", &message))
            .send()
            .await
            .map_err(AgentError::from_network_error)?;
        let response = Self::check(response).await?;

        let mut stream = response.bytes_stream();
        let mut chunks = 0usize;
        let mut bytes = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AgentError::from_network_error)?;
            chunks += 1;
            bytes += chunk.len();
        }

        tracing::debug!(
            "Stream from {} closed after {} chunks ({} bytes)",
            self.agent_id,
            chunks,
            bytes
        );
        Ok(json!({ "chunks": chunks, "bytes": bytes }))
    }
}
