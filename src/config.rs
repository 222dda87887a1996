//! Configuration for the ledger and the HTTP node

use serde::Deserialize;
use thiserror::Error;

use crate::ledger::cube::MAX_DIFFICULTY;

use std::fs;
use std::io;
use std::path::Path;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Consensus parameters of a [`CubeChain`](crate::ledger::CubeChain)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex characters required in a cube hash
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Amount paid to the miner of each cube
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,
    /// Verifier reward attached to transfers sent through a wallet
    #[serde(default)]
    pub verifier_reward: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            verifier_reward: 0.0,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "ledger.mining_reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }

        if !self.verifier_reward.is_finite() || self.verifier_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "ledger.verifier_reward must be a non-negative number, got {}",
                self.verifier_reward
            )));
        }

        Ok(())
    }
}

impl NodeConfig {
    /// Loads the config from a TOML file, falling back to defaults when the file is absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_str = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(config_str)?;

        if config.server.host.is_empty() {
            return Err(ConfigError::Invalid("server.host must be set".to_string()));
        }
        config.ledger.validate()?;

        Ok(config)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_difficulty() -> usize {
    2
}

fn default_mining_reward() -> f64 {
    100.0
}
