//! Configuration Loader
//!
//! Environment-aware loading: built-in defaults, then the base file, then the
//! environment overlay file, then environment variables.

use super::EntityConfig;
use crate::error::EntityResult;
use config::{Config, Environment, File};
use std::env;
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_ENV_PREFIX: &str = "ENTITY_CORE";
const FILE_STEM: &str = "entity_core";

/// Builder for one configuration load
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    directory: PathBuf,
    environment: String,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            directory: Self::default_config_directory(),
            environment: Self::detect_environment(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Use an explicit environment instead of detecting it
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }

    /// Prefix for override variables, `PREFIX__SECTION__KEY`
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn load(&self) -> EntityResult<EntityConfig> {
        let defaults = EntityConfig::default();
        let base = self.directory.join(format!("{FILE_STEM}.toml"));
        let overlay = self
            .directory
            .join(format!("{FILE_STEM}.{}.toml", self.environment));

        debug!(
            environment = %self.environment,
            directory = %self.directory.display(),
            "Loading entity configuration"
        );

        let config: EntityConfig = Config::builder()
            .set_default("persistence.enabled", defaults.persistence.enabled)?
            .set_default(
                "persistence.lock_for_update",
                defaults.persistence.lock_for_update,
            )?
            .set_default("query.max_results", defaults.query.max_results as u64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?
            .add_source(File::from(base.as_path()).required(false))
            .add_source(File::from(overlay.as_path()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!(
            max_results = config.query.max_results,
            persistence_enabled = config.persistence.enabled,
            lock_for_update = config.persistence.lock_for_update,
            "Entity configuration loaded"
        );
        Ok(config)
    }

    /// Get current environment from environment variables
    fn detect_environment() -> String {
        env::var("ENTITY_CORE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("ENTITY_CORE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_directory(dir.path())
            .with_environment("test")
            .with_env_prefix("ENTITY_CORE_LOADER_DEFAULTS")
            .load()
            .unwrap();
        assert_eq!(config, EntityConfig::default());
    }

    #[test]
    fn test_environment_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("entity_core.toml"),
            "[query]\nmax_results = 50\n\n[persistence]\nlock_for_update = false\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("entity_core.test.toml"),
            "[query]\nmax_results = 5\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_directory(dir.path())
            .with_environment("test")
            .with_env_prefix("ENTITY_CORE_LOADER_OVERLAY")
            .load()
            .unwrap();
        assert_eq!(config.query.max_results, 5);
        assert!(!config.persistence.lock_for_update);
        assert!(config.persistence.enabled);
    }

    #[test]
    fn test_environment_variables_override_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("entity_core.toml"),
            "[query]\nmax_results = 50\n",
        )
        .unwrap();
        env::set_var("ENTITY_CORE_LOADER_ENV__QUERY__MAX_RESULTS", "7");
        env::set_var("ENTITY_CORE_LOADER_ENV__PERSISTENCE__ENABLED", "false");

        let config = ConfigLoader::new()
            .with_directory(dir.path())
            .with_environment("test")
            .with_env_prefix("ENTITY_CORE_LOADER_ENV")
            .load()
            .unwrap();

        env::remove_var("ENTITY_CORE_LOADER_ENV__QUERY__MAX_RESULTS");
        env::remove_var("ENTITY_CORE_LOADER_ENV__PERSISTENCE__ENABLED");
        assert_eq!(config.query.max_results, 7);
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("entity_core.toml"),
            "[query]\nmax_results = 0\n",
        )
        .unwrap();

        let err = ConfigLoader::new()
            .with_directory(dir.path())
            .with_environment("test")
            .with_env_prefix("ENTITY_CORE_LOADER_INVALID")
            .load()
            .unwrap_err();
        assert!(matches!(err, crate::error::EntityError::Configuration { .. }));
    }
}
