//! Shard Durability Configuration
//!
//! Top-level TOML configuration combining the translog and the remote
//! transfer settings:
//!
//! ```toml
//! [translog]
//! translog_dir = "/var/lib/shard/0/translog"
//! generation_threshold_size = 67108864
//! durability = "async"
//! sync_interval = 5000
//!
//! [translog.retention]
//! total_files = 10
//!
//! [transfer]
//! store_type = "local_fs"
//! local_path = "/var/lib/shard/remote"
//! remote_base_path = ["cluster-a", "index-1", "0"]
//! ```
//!
//! `TRANSLOG_DIR`, when set, overrides `translog.translog_dir`.

use crate::transfer::TransferConfig;
use crate::translog::TranslogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Error loading configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Everything one shard needs to make its writes durable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardDurabilityConfig {
    pub translog: TranslogConfig,
    pub transfer: TransferConfig,
}

impl ShardDurabilityConfig {
    /// Parse and validate a TOML document, then apply env overrides
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ShardDurabilityConfig = toml::from_str(content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Test configuration: tiny generations, in-memory remote store
    pub fn test() -> Self {
        ShardDurabilityConfig {
            translog: TranslogConfig::test(),
            transfer: TransferConfig::test(),
        }
    }

    /// Apply `TRANSLOG_DIR` from an arbitrary variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("TRANSLOG_DIR").filter(|d| !d.trim().is_empty()) {
            self.translog.translog_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.translog.generation_threshold_size == 0 {
            return Err(ConfigError::Invalid(
                "translog.generation_threshold_size must be > 0".to_string(),
            ));
        }
        if self.translog.sync_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "translog.sync_interval must be > 0".to_string(),
            ));
        }
        self.transfer.validate().map_err(ConfigError::Invalid)
    }
}
