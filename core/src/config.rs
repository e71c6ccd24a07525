//! Configuration types for Agora

use crate::error::{AgoraError, AgoraResult};
use serde::{Deserialize, Serialize};

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Logging level (overridden by `RUST_LOG`)
    pub log_level: String,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Ballot engine configuration
    #[serde(default)]
    pub ballot: BallotConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "agora-node".to_string(),
            log_level: "info".to_string(),
            api: ApiConfig::default(),
            ballot: BallotConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_json(json: &str) -> AgoraResult<Self> {
        let config: NodeConfig = serde_json::from_str(json)
            .map_err(|e| AgoraError::ConfigError(e.to_string()))?;
        config.ballot.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> AgoraResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            enable_cors: true,
        }
    }
}

/// Ballot engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotConfig {
    /// Maximum number of proposals, GENESIS included
    pub max_proposals: usize,

    /// Maximum proposal description length in bytes
    pub max_description_len: usize,

    /// Capacity of the event channel handed to observers
    pub event_channel_capacity: usize,
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            max_proposals: 1000,
            max_description_len: 1024,
            event_channel_capacity: 100,
        }
    }
}

impl BallotConfig {
    pub fn validate(&self) -> AgoraResult<()> {
        // GENESIS takes one slot
        if self.max_proposals < 2 {
            return Err(AgoraError::ConfigError(
                "max_proposals must leave room for at least one proposal".into(),
            ));
        }
        if self.max_description_len == 0 {
            return Err(AgoraError::ConfigError("max_description_len must be positive".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(AgoraError::ConfigError("event_channel_capacity must be positive".into()));
        }
        Ok(())
    }
}
