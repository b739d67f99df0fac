//! Engine Configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default namespace prefixed to every persisted key
pub const DEFAULT_NAMESPACE: &str = "__redis:complex";

/// Default number of concurrency-gate buckets
pub const DEFAULT_GATE_BUCKETS: usize = 64;

/// Default floor for the skip-list height
pub const DEFAULT_SKIPLIST_MIN_HEIGHT: usize = 4;

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// Could not read the configuration file
    Io(std::io::Error),
    /// The document is not valid TOML for this schema
    Parse(toml::de::Error),
    /// Parsed but semantically invalid
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
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

/// Configuration for the command executor and its engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix for every persisted key (stands in for a column family)
    pub namespace: String,
    /// Number of buckets in the per-key concurrency gate
    pub gate_buckets: usize,
    /// Lower bound for the skip-list height
    pub skiplist_min_height: usize,
    /// Seed for skip-list leveling; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            namespace: DEFAULT_NAMESPACE.to_string(),
            gate_buckets: DEFAULT_GATE_BUCKETS,
            skiplist_min_height: DEFAULT_SKIPLIST_MIN_HEIGHT,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Create config for testing (deterministic leveling, small gate)
    pub fn test() -> Self {
        EngineConfig {
            namespace: "test".to_string(),
            gate_buckets: 8,
            skiplist_min_height: DEFAULT_SKIPLIST_MIN_HEIGHT,
            seed: Some(0),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".into()));
        }
        if self.gate_buckets == 0 {
            return Err(ConfigError::Invalid("gate_buckets must be at least 1".into()));
        }
        if self.skiplist_min_height == 0 {
            return Err(ConfigError::Invalid(
                "skiplist_min_height must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
