//! Operator command value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// A free-text command issued by the operator (Value Object)
///
/// This is the input that starts an Order: it is sent to the General
/// verbatim and recorded on the Order for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCommand {
    content: String,
}

impl OperatorCommand {
    /// Create a command, rejecting empty or whitespace-only text
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::EmptyCommand);
        }
        Ok(Self {
            content: content.trim().to_string(),
        })
    }

    /// Get the command text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume and return the inner content
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl TryFrom<&str> for OperatorCommand {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        OperatorCommand::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_creation_trims() {
        let cmd = OperatorCommand::new("  increase position sizing for trading \n").unwrap();
        assert_eq!(cmd.content(), "increase position sizing for trading");
    }

    #[test]
    fn test_empty_command_rejected() {
        assert_eq!(OperatorCommand::new(""), Err(DomainError::EmptyCommand));
        assert_eq!(OperatorCommand::new("   "), Err(DomainError::EmptyCommand));
    }

    #[test]
    fn test_try_from_str() {
        let cmd: OperatorCommand = "tighten stops".try_into().unwrap();
        assert_eq!(cmd.to_string(), "tighten stops");
    }
}
