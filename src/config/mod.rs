//! # Entity Core Configuration
//!
//! Layered configuration for entity services, state persistence and logging.
//!
//! ## Architecture
//!
//! - **Defaults**: every key has a built-in default
//! - **Files**: `entity_core.toml` then `entity_core.{environment}.toml` from
//!   the configuration directory, both optional
//! - **Environment variables**: `ENTITY_CORE__SECTION__KEY` wins over files
//! - **Explicit Validation**: values are checked once, at load
//!
//! ## Usage
//!
//! ```rust,no_run
//! use entity_state_core::config::EntityConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EntityConfig::load()?;
//! assert!(config.query.max_results > 0);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::error::{configuration_error, EntityResult};
use serde::{Deserialize, Serialize};

pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    pub persistence: PersistenceConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

/// State machine persistence behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// When false, persisters built from this configuration never write
    pub enabled: bool,
    /// Lock the entity row between reading and writing its state
    pub lock_for_update: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_for_update: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound on rows returned by `find_all`
    pub max_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_results: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EntityConfig {
    /// Load from the default directory and environment
    pub fn load() -> EntityResult<Self> {
        ConfigLoader::new().load()
    }

    pub fn validate(&self) -> EntityResult<()> {
        if self.query.max_results == 0 {
            return Err(configuration_error("query.max_results must be positive"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(configuration_error("logging.level must not be blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityError;

    #[test]
    fn test_defaults_are_valid() {
        let config = EntityConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.persistence.enabled);
        assert!(config.persistence.lock_for_update);
        assert_eq!(config.query.max_results, 1000);
    }

    #[test]
    fn test_zero_max_results_rejected() {
        let mut config = EntityConfig::default();
        config.query.max_results = 0;
        assert!(matches!(
            config.validate(),
            Err(EntityError::Configuration { .. })
        ));
    }
}
