//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Command cannot be empty")]
    EmptyCommand,

    #[error("Invalid agent id: {0:?}")]
    InvalidAgentId(String),

    #[error("Unknown rank: {0}")]
    UnknownRank(String),

    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    #[error("Invalid value for config key {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::EmptyCommand.is_cancelled());
        assert!(!DomainError::UnknownRank("colonel".to_string()).is_cancelled());
    }

    #[test]
    fn test_invalid_config_value_display() {
        let error = DomainError::InvalidConfigValue {
            key: "auto_approve".to_string(),
            value: "maybe".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for config key auto_approve: maybe"
        );
    }
}
