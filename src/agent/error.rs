//! Typed errors for downstream agent calls
//!
//! Every failure a hosted agent can produce is funneled into [`AgentError`] so
//! the relay can log the cause and still hand callers a uniform shape.

use thiserror::Error;

/// Downstream agent call errors
///
/// - `Unauthorized` (401/403) - the hosted agent rejected our credentials
/// - `NotFound` (404) - agent id unknown to the remote server
/// - `BadRequest` (400/422) - the remote server refused the payload
/// - `ServiceError` (5xx) - remote server failure
/// - `Network` - connection refused, DNS, timeout
/// - `InvalidResponse` - body was not valid JSON
/// - `Rpc` - A2A JSON-RPC error object in an otherwise successful response
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON-RPC error returned by the A2A endpoint
    #[error("A2A error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Convert HTTP status code and error text into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 | 403 => AgentError::Unauthorized(error_text),
            404 => AgentError::NotFound(error_text),
            400 | 422 => AgentError::BadRequest(error_text),
            500..=599 => AgentError::ServiceError(error_text),
            _ => AgentError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert transport errors into a typed error
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            AgentError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else if e.is_decode() {
            AgentError::InvalidResponse(e.to_string())
        } else {
            AgentError::Network(e.to_string())
        }
    }

    /// Whether the failure happened before the agent produced an answer
    pub fn is_transport(&self) -> bool {
        matches!(self, AgentError::Network(_))
    }
}
