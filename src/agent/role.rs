//! Agent roles and the endpoints that serve them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical role of a hosted agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Research,
    Writing,
    Analysis,
}

impl AgentRole {
    /// All roles, in registry order
    pub const ALL: [AgentRole; 3] = [AgentRole::Research, AgentRole::Writing, AgentRole::Analysis];

    /// Order in which the pipeline visits the roles
    pub const PIPELINE_ORDER: [AgentRole; 3] =
        [AgentRole::Research, AgentRole::Analysis, AgentRole::Writing];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Research => "research",
            AgentRole::Writing => "writing",
            AgentRole::Analysis => "analysis",
        }
    }

    /// Identifier the hosted agent is exported under
    pub fn default_agent_id(&self) -> &'static str {
        match self {
            AgentRole::Research => "researchAgent",
            AgentRole::Writing => "writingAgent",
            AgentRole::Analysis => "analysisAgent",
        }
    }

    /// Environment variable that overrides this role's base URL
    pub fn url_env_var(&self) -> &'static str {
        match self {
            AgentRole::Research => "RESEARCH_AGENT_URL",
            AgentRole::Writing => "WRITING_AGENT_URL",
            AgentRole::Analysis => "ANALYSIS_AGENT_URL",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(AgentRole::Research),
            "writing" => Ok(AgentRole::Writing),
            "analysis" => Ok(AgentRole::Analysis),
            other => Err(format!(
                "Unknown agent role '{}'. Use: research, writing, or analysis",
                other
            )),
        }
    }
}

/// Binding used to reach one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEndpoint {
    pub role: AgentRole,
    pub base_url: String,
    pub agent_id: String,
}

impl AgentEndpoint {
    pub fn new(role: AgentRole, base_url: impl Into<String>, agent_id: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            role,
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_id: agent_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Research".parse::<AgentRole>(), Ok(AgentRole::Research));
        assert_eq!(" ANALYSIS ".parse::<AgentRole>(), Ok(AgentRole::Analysis));
        assert!("editing".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&AgentRole::Writing).unwrap();
        assert_eq!(json, "\"writing\"");
    }

    #[test]
    fn test_default_agent_ids_are_distinct() {
        let ids: std::collections::HashSet<_> =
            AgentRole::ALL.iter().map(|r| r.default_agent_id()).collect();
        assert_eq!(ids.len(), AgentRole::ALL.len());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let endpoint =
            AgentEndpoint::new(AgentRole::Research, "http://localhost:4111/", "researchAgent");
        assert_eq!(endpoint.base_url, "http://localhost:4111");
    }
}
