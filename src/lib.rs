//! agent-relay: HTTP relay in front of hosted research, analysis and writing agents
//!
//! This library provides:
//! - A registry binding each agent role to one hosted endpoint
//! - Discovery and a communication self-test across all agents
//! - Single-message dispatch by agent id
//! - A sequential research -> analysis -> writing pipeline
//! - An axum HTTP service exposing all of the above

pub mod agent;
pub mod config;
pub mod orchestration;
pub mod registry;
pub mod transport;

pub use agent::{AgentClient, AgentEndpoint, AgentRole, MastraAgentClient, Message};
pub use config::Config;
pub use registry::AgentRegistry;
