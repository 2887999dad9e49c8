//! Configuration management for agent-relay
//!
//! Settings come from an optional TOML file and are then overridden by the
//! environment variables the hosted deployment sets (`RESEARCH_AGENT_URL`,
//! `ALLOWED_ORIGINS`, `PORT`, ...).

use crate::agent::AgentRole;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub agents: AgentsConfig,
    pub client: ClientConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to make cross-origin requests
    pub allowed_origins: Vec<String>,
    /// Upper bound on pipeline executions in flight (0 = unbounded)
    pub max_concurrent_workflows: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            max_concurrent_workflows: 32,
        }
    }
}

/// Where one hosted agent lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentServerConfig {
    pub base_url: String,
    pub agent_id: String,
}

impl AgentServerConfig {
    pub fn for_role(role: AgentRole) -> Self {
        Self {
            base_url: format!("https://your-{}-agent.mastra.ai", role.as_str()),
            agent_id: role.default_agent_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AgentsTable")]
pub struct AgentsConfig {
    pub research: AgentServerConfig,
    pub writing: AgentServerConfig,
    pub analysis: AgentServerConfig,
}

/// `[agents.<role>]` as written in the file; omitted keys take the role's defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentServerTable {
    base_url: Option<String>,
    agent_id: Option<String>,
}

impl AgentServerTable {
    fn resolve(self, role: AgentRole) -> AgentServerConfig {
        let defaults = AgentServerConfig::for_role(role);
        AgentServerConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            agent_id: self.agent_id.unwrap_or(defaults.agent_id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentsTable {
    research: AgentServerTable,
    writing: AgentServerTable,
    analysis: AgentServerTable,
}

impl From<AgentsTable> for AgentsConfig {
    fn from(table: AgentsTable) -> Self {
        Self {
            research: table.research.resolve(AgentRole::Research),
            writing: table.writing.resolve(AgentRole::Writing),
            analysis: table.analysis.resolve(AgentRole::Analysis),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            research: AgentServerConfig::for_role(AgentRole::Research),
            writing: AgentServerConfig::for_role(AgentRole::Writing),
            analysis: AgentServerConfig::for_role(AgentRole::Analysis),
        }
    }
}

impl AgentsConfig {
    pub fn get(&self, role: AgentRole) -> &AgentServerConfig {
        match role {
            AgentRole::Research => &self.research,
            AgentRole::Writing => &self.writing,
            AgentRole::Analysis => &self.analysis,
        }
    }

    pub fn get_mut(&mut self, role: AgentRole) -> &mut AgentServerConfig {
        match role {
            AgentRole::Research => &mut self.research,
            AgentRole::Writing => &mut self.writing,
            AgentRole::Analysis => &mut self.analysis,
        }
    }
}

/// Settings for outbound calls to hosted agents
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds; unset keeps the HTTP client's defaults
    pub timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hand the research stage's output to the analysis prompt
    pub feed_forward: bool,
    /// Seconds a live-update stream may stay open
    pub live_update_timeout_secs: u64,
    /// Live-update streams open at once across all workflows (0 = unbounded)
    pub max_live_updates: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feed_forward: false,
            live_update_timeout_secs: 120,
            max_live_updates: 96,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location if it exists,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Config::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default configuration file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "agent-relay")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for role in AgentRole::ALL {
            if let Some(url) = lookup(role.url_env_var()).filter(|v| !v.trim().is_empty()) {
                self.agents.get_mut(role).base_url = url.trim().to_string();
            }
        }

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
        }

        if let Some(secs) = lookup("AGENT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_TIMEOUT_SECS".to_string(),
                message: format!("'{}' is not a number of seconds", secs),
            })?;
            self.client.timeout_secs = Some(secs);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in AgentRole::ALL {
            let agent = self.agents.get(role);
            let key = format!("agents.{}.base_url", role);
            let parsed = url::Url::parse(&agent.base_url).map_err(|e| ConfigError::InvalidValue {
                key: key.clone(),
                message: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
            if agent.agent_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("agents.{}.agent_id", role),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
