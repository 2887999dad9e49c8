//! Outbound message envelope
//!
//! A fresh [`Message`] is built for every call to a downstream agent and is
//! dropped once the call returns. Nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Sender tag used when the relay itself originates a message
pub const GATEWAY_SENDER: &str = "gateway-agent";

/// Opaque JSON returned by a hosted agent
///
/// The schema belongs to the provider; the relay only requires valid JSON.
pub type AgentPayload = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessagePart {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub from: String,
}

/// A2A message envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub kind: String,
    pub message_id: String,
    pub role: String,
    pub parts: Vec<MessagePart>,
    pub metadata: MessageMetadata,
}

impl Message {
    /// User message sent on behalf of the relay
    pub fn user(text: impl Into<String>) -> Self {
        Self::from_sender(text, GATEWAY_SENDER)
    }

    pub fn from_sender(text: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            message_id: format!("msg-{}", uuid::Uuid::new_v4().simple()),
            role: "user".to_string(),
            parts: vec![MessagePart::Text { text: text.into() }],
            metadata: MessageMetadata { from: from.into() },
        }
    }

    /// Concatenated text of all parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Best-effort extraction of the generated text from an agent payload
///
/// Hosted agents answer `generate` with an object carrying a `text` field;
/// anything else is rendered as compact JSON.
pub fn payload_text(payload: &AgentPayload) -> String {
    match payload {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match map.get("text") {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => payload.to_string(),
        },
        other => other.to_string(),
    }
}
