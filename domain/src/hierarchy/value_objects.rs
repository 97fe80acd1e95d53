//! Hierarchy value objects

use crate::core::error::DomainError;
use crate::core::string::slugify;
use serde::{Deserialize, Serialize};

/// Canonical identifier of an agent (e.g. `momentum_trader`).
///
/// Agent ids are stable slugs; display names may change over time but the
/// id never does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an AgentId from an existing string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an AgentId, rejecting ids that are empty after trimming.
    pub fn parse(id: &str) -> Result<Self, DomainError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidAgentId(id.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derives an id from a display name (`"Momentum Trader"` → `momentum_trader`).
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_blank() {
        assert!(AgentId::parse("  ").is_err());
        assert_eq!(AgentId::parse(" risk_manager ").unwrap().as_str(), "risk_manager");
    }

    #[test]
    fn test_from_name_slugifies() {
        assert_eq!(AgentId::from_name("Breakout Hunter").as_str(), "breakout_hunter");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&AgentId::new("momentum_trader")).unwrap();
        assert_eq!(json, "\"momentum_trader\"");
    }
}
