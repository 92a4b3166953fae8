use crate::error::EntityError;
use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Invalid transition for machine '{machine_id}': no edge from {from} on {event}")]
    InvalidTransition {
        machine_id: String,
        from: String,
        event: String,
    },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Persistence operation failed: {0}")]
    Persistence(#[from] EntityError),
}

impl StateMachineError {
    /// True when the persisted entity could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Persistence(err) if err.is_not_found())
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper function to create configuration errors
pub fn configuration_error(reason: impl Into<String>) -> StateMachineError {
    StateMachineError::Configuration {
        reason: reason.into(),
    }
}

/// Reject a blank state machine identifier
pub fn require_machine_id(machine_id: &str, owner: &str) -> StateMachineResult<()> {
    if machine_id.trim().is_empty() {
        return Err(configuration_error(format!(
            "{owner} must declare a non-blank state machine id"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_machine_id_rejected() {
        assert!(require_machine_id("order", "listener").is_ok());
        let err = require_machine_id("  ", "listener").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: listener must declare a non-blank state machine id"
        );
    }

    #[test]
    fn test_not_found_passes_through() {
        let err: StateMachineError = EntityError::NotFound {
            entity: "orders".to_string(),
            conditions: "AND@id=1".to_string(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!configuration_error("x").is_not_found());
    }
}
