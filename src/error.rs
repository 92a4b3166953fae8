use thiserror::Error;

/// Errors raised by entity services, condition parsing and storage executors
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Malformed predicate '{key}': {reason}")]
    MalformedPredicate { key: String, reason: String },

    #[error("No {entity} found matching {conditions}")]
    NotFound { entity: String, conditions: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailure { reason: String },

    #[error("Unknown field '{field}' for entity {entity}")]
    UnknownField { entity: String, field: String },

    #[error("Unsupported operator '{operator}' in predicate '{key}'")]
    UnsupportedOperator { key: String, operator: String },

    #[error("Unknown mutator '{name}' for entity {entity}")]
    UnknownMutator { entity: String, name: String },

    #[error("Invalid argument for mutator '{name}': {reason}")]
    InvalidMutatorArgument { name: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EntityError {
    /// True when a required single-row lookup found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<config::ConfigError> for EntityError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            reason: err.to_string(),
        }
    }
}

pub type EntityResult<T> = Result<T, EntityError>;

/// Helper function to create configuration errors
pub fn configuration_error(reason: impl Into<String>) -> EntityError {
    EntityError::Configuration {
        reason: reason.into(),
    }
}

/// Helper function to create malformed predicate errors
pub fn malformed_predicate(key: impl Into<String>, reason: impl Into<String>) -> EntityError {
    EntityError::MalformedPredicate {
        key: key.into(),
        reason: reason.into(),
    }
}

/// Helper function to create transaction failures
pub fn transaction_failure(reason: impl Into<String>) -> EntityError {
    EntityError::TransactionFailure {
        reason: reason.into(),
    }
}
