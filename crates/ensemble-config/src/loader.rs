//! Configuration loader with multi-source merging

use crate::{ConfigError, EnsembleConfig, Paths};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir).
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "ENS".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence.
    pub fn load(self) -> Result<EnsembleConfig, ConfigError> {
        let mut builder = config::Config::builder();

        let defaults = EnsembleConfig::default();
        builder = builder
            .add_source(config::Config::try_from(&defaults).map_err(|e| {
                ConfigError::ValidationError(format!("failed to seed defaults: {e}"))
            })?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("failed to build config: {e}")))?;

        built
            .try_deserialize()
            .map_err(|e| ConfigError::ValidationError(format!("failed to deserialize config: {e}")))
    }

    /// Load configuration or return defaults if not found.
    pub fn load_or_default(self) -> EnsembleConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("failed to load config");

        assert_eq!(config.group.expiration_ms, 0);
        assert_eq!(config.subgroups.partitions, 16);
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("ensemble.toml"),
            r#"
[group]
expiration_ms = 5000
address = "127.0.0.1:9000"

[subgroups]
partitions = 32
"#,
        )
        .expect("failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.group.expiration_ms, 5000);
        assert_eq!(config.group.address.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(config.subgroups.partitions, 32);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("ensemble.toml"),
            "[group]\nexpiration_ms = 1000\n",
        )
        .expect("failed to write project config");

        fs::write(
            project_dir.join("ensemble.local.toml"),
            "[group]\nexpiration_ms = 9999\n",
        )
        .expect("failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.group.expiration_ms, 9999);
    }
}
