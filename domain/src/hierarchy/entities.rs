//! Hierarchy domain entities

use super::value_objects::AgentId;
use crate::core::error::DomainError;
use crate::core::model::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rank of an agent in the chain of command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    General,
    Lieutenant,
    Soldier,
}

impl Rank {
    pub fn as_str(&self) -> &str {
        match self {
            Rank::General => "general",
            Rank::Lieutenant => "lieutenant",
            Rank::Soldier => "soldier",
        }
    }

    /// Leaders carry a DIRECT REPORTS block and can never be deactivated
    pub fn is_leader(&self) -> bool {
        matches!(self, Rank::General | Rank::Lieutenant)
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rank {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Rank::General),
            "lieutenant" => Ok(Rank::Lieutenant),
            "soldier" => Ok(Rank::Soldier),
            other => Err(DomainError::UnknownRank(other.to_string())),
        }
    }
}

/// Functional domain of an agent.
///
/// The domain selects the self-write template: each domain has its own
/// output contract that a regenerated document must preserve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DomainType {
    /// Leaders (General, Lieutenants)
    Command,
    /// Trade decision makers; answer with a JSON decision object
    #[default]
    Trader,
    /// Research / market intelligence; answer in a fixed section template
    Analyst,
    /// Risk oversight
    Risk,
    Other(String),
}

impl DomainType {
    pub fn as_str(&self) -> &str {
        match self {
            DomainType::Command => "command",
            DomainType::Trader => "trader",
            DomainType::Analyst => "analyst",
            DomainType::Risk => "risk",
            DomainType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DomainType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "command" | "leader" => DomainType::Command,
            "trader" | "trading" => DomainType::Trader,
            "analyst" | "research" | "intelligence" => DomainType::Analyst,
            "risk" | "risk_manager" => DomainType::Risk,
            other => DomainType::Other(other.to_string()),
        })
    }
}

impl Serialize for DomainType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DomainType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(domain) = s.parse();
        Ok(domain)
    }
}

/// An agent in the hierarchy (Entity)
///
/// `current_prompt` is a denormalized mirror of the agent's active
/// [`PromptVersion`]; only the repository writes it, in the same atomic
/// unit that flips the active version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub rank: Rank,
    pub domain_type: DomainType,
    pub parent_id: Option<AgentId>,
    pub active: bool,
    pub model: Option<Model>,
    pub current_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Materialize a [`NewAgent`] request into an active agent
    pub fn from_new(new: &NewAgent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id.clone(),
            name: new.name.clone(),
            rank: new.rank,
            domain_type: new.domain_type.clone(),
            parent_id: new.parent_id.clone(),
            active: true,
            model: new.model.clone(),
            current_prompt: new.prompt.clone(),
            description: new.description.clone(),
            created_at,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.rank.is_leader()
    }

    /// Model to call for this agent, falling back to `default`
    pub fn model_or(&self, default: &Model) -> Model {
        self.model.clone().unwrap_or_else(|| default.clone())
    }
}

/// Request to create an agent (seeding or an approved "create agent" change)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAgent {
    pub id: AgentId,
    pub name: String,
    pub rank: Rank,
    pub domain_type: DomainType,
    pub parent_id: Option<AgentId>,
    pub model: Option<Model>,
    pub prompt: String,
    pub description: Option<String>,
}

impl NewAgent {
    /// A soldier whose id is derived from its name
    pub fn soldier(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: AgentId::from_name(&name),
            name,
            rank: Rank::Soldier,
            domain_type: DomainType::default(),
            parent_id: None,
            model: None,
            prompt: prompt.into(),
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<AgentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_domain(mut self, domain_type: DomainType) -> Self {
        self.domain_type = domain_type;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<AgentId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Performance statistics attached to a prompt version.
///
/// Produced by the (out of scope) trading simulation; carried opaquely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub trades: u32,
    pub win_rate: f64,
    pub pnl: f64,
}

/// One immutable revision of an agent's prompt document (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub agent_id: AgentId,
    /// Monotonic per agent, starting at 1, never reused
    pub version: u32,
    pub text: String,
    pub notes: String,
    pub author: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PerformanceStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_parse_and_display() {
        assert_eq!("Lieutenant".parse::<Rank>().unwrap(), Rank::Lieutenant);
        assert_eq!(Rank::Soldier.to_string(), "soldier");
        assert!("colonel".parse::<Rank>().is_err());
    }

    #[test]
    fn test_leader_ranks() {
        assert!(Rank::General.is_leader());
        assert!(Rank::Lieutenant.is_leader());
        assert!(!Rank::Soldier.is_leader());
    }

    #[test]
    fn test_domain_type_aliases() {
        assert_eq!("research".parse::<DomainType>().unwrap(), DomainType::Analyst);
        assert_eq!("Trading".parse::<DomainType>().unwrap(), DomainType::Trader);
        assert_eq!(
            "arbitrage".parse::<DomainType>().unwrap(),
            DomainType::Other("arbitrage".to_string())
        );
    }

    #[test]
    fn test_domain_type_serde_roundtrip() {
        let json = serde_json::to_string(&DomainType::Risk).unwrap();
        assert_eq!(json, "\"risk\"");
        let parsed: DomainType = serde_json::from_str("\"analyst\"").unwrap();
        assert_eq!(parsed, DomainType::Analyst);
    }

    #[test]
    fn test_agent_from_new() {
        let new = NewAgent::soldier("Momentum Trader", "You are the Momentum Trader.")
            .with_parent("trading_lieutenant")
            .with_model(Model::Gpt5);
        let agent = Agent::from_new(&new, Utc::now());

        assert_eq!(agent.id.as_str(), "momentum_trader");
        assert!(agent.active);
        assert_eq!(agent.current_prompt, "You are the Momentum Trader.");
        assert_eq!(agent.parent_id, Some(AgentId::new("trading_lieutenant")));
        assert_eq!(agent.model_or(&Model::default()), Model::Gpt5);
    }
}
