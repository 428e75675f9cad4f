//! Connection configuration
//!
//! Everything an `RpcClient` needs at construction: the destination server id
//! (used to build topic names), broker address, agent-mode flag, and the
//! worker-pool size for agent mode. Loadable from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Connection configuration for an RPC client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// Destination/server identifier (must match [a-zA-Z0-9._-]+); scopes the
    /// request and agent-request topics
    pub server_id: String,

    /// Broker host
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// When true the connection also subscribes the agent-request topic and
    /// dispatches inbound requests to a local handler
    #[serde(default)]
    pub agent: bool,

    /// Worker-pool bound for agent-mode request handling
    #[serde(default = "default_agent_workers")]
    pub agent_workers: usize,

    /// MQTT keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Requesting identity attached to every outbound request
    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable containing the authentication token attached to
    /// every outbound request
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_agent_workers() -> usize {
    8
}

fn default_keep_alive_secs() -> u64 {
    60
}

impl RpcConfig {
    /// Create a configuration with defaults for everything but the server id
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            host: default_host(),
            port: default_port(),
            agent: false,
            agent_workers: default_agent_workers(),
            keep_alive_secs: default_keep_alive_secs(),
            username: None,
            token_env: None,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::FileRead)?;
        let config: RpcConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::protocol::validate_server_id(&self.server_id)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "port must be non-zero".to_string(),
            ));
        }

        if self.agent && self.agent_workers == 0 {
            return Err(ConfigError::InvalidConfig(
                "agent_workers must be at least 1 in agent mode".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the authentication token from the configured environment
    /// variable, if any
    pub fn token(&self) -> Option<String> {
        self.token_env
            .as_ref()
            .and_then(|env_name| std::env::var(env_name).ok())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    FileRead(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
