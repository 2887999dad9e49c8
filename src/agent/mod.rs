//! Hosted agents: roles, endpoints, message envelopes and the client seam

pub mod client;
pub mod error;
pub mod message;
pub mod role;

pub use client::{AgentClient, MastraAgentClient};
pub use error::AgentError;
pub use message::{payload_text, AgentPayload, Message, MessagePart, GATEWAY_SENDER};
pub use role::{AgentEndpoint, AgentRole};

/// Label reported alongside every agent-facing response
pub const PROTOCOL_LABEL: &str = "Mastra Cloud Agent API";

/// A2A protocol version advertised by the readiness probe
pub const A2A_PROTOCOL_VERSION: &str = "Mastra Native A2A v0.3.0";
