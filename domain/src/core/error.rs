//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Priority must be between 1 and 10, got {0}")]
    InvalidPriority(u8),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown phase type: {0}")]
    UnknownPhaseType(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Invalid policy rule '{name}': {reason}")]
    InvalidPolicy { name: String, reason: String },

    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
}

impl DomainError {
    /// Whether this error was caused by caller-supplied configuration
    /// rather than by runtime state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownRole(_)
                | DomainError::UnknownPhaseType(_)
                | DomainError::UnknownFormat(_)
                | DomainError::InvalidPolicy { .. }
        )
    }
}
