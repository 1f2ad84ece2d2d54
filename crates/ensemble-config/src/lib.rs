//! Configuration loading for the group-coordination core.
//!
//! Provides hierarchical configuration loading from multiple sources, in
//! ascending precedence:
//! 1. Built-in defaults (lowest precedence)
//! 2. `~/.config/ensemble/config.toml` (user defaults)
//! 3. `ensemble.toml` (project config)
//! 4. `ensemble.local.toml` (gitignored, local overrides)
//! 5. `ENS_*` environment variables (highest precedence)

use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level configuration for the group-coordination core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub group: GroupConfig,
    pub subgroups: SubGroupConfig,
}

/// Base-group parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// How long to wait after a persistent member's session drops before
    /// declaring it gone. `0` means leave is published immediately.
    pub expiration_ms: u64,
    /// Address the runtime advertises for this process, if any.
    pub address: Option<String>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            expiration_ms: 0,
            address: None,
        }
    }
}

/// Pluggable sub-group composition parameters (hash-ring and partitioned).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubGroupConfig {
    /// Virtual nodes per member in a hash-ring sub-group.
    pub virtual_nodes: u32,
    /// Partition count for a partitioned sub-group.
    pub partitions: u32,
    /// Replicas assigned per partition.
    pub replication_factor: u32,
    /// Name of the partitioner strategy to use (e.g. "round-robin").
    pub partitioner: String,
}

impl Default for SubGroupConfig {
    fn default() -> Self {
        Self {
            virtual_nodes: 100,
            partitions: 16,
            replication_factor: 2,
            partitioner: "round-robin".to_string(),
        }
    }
}

impl EnsembleConfig {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EnsembleConfig::default();
        assert_eq!(config.group.expiration_ms, 0);
        assert_eq!(config.subgroups.partitions, 16);
        assert_eq!(config.subgroups.replication_factor, 2);
    }
}
