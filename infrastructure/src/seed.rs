//! Seed file loading
//!
//! A seed file is TOML with an optional `[config]` table of system config
//! values and an `[[agents]]` array. It is turned into a
//! [`SeedInput`] for [`SeedHierarchyUseCase`](hq_application::SeedHierarchyUseCase).

use hq_application::SeedInput;
use hq_domain::{AgentId, DomainType, Model, NewAgent, Rank};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_ROSTER: &str = include_str!("../assets/roster.toml");

#[derive(Error, Debug)]
pub enum SeedFileError {
    #[error("Cannot read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid agent entry '{name}': {reason}")]
    InvalidAgent { name: String, reason: String },
}

fn default_rank() -> Rank {
    Rank::Soldier
}

/// One `[[agents]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAgent {
    /// Derived from `name` when omitted
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_rank")]
    pub rank: Rank,
    pub domain: Option<DomainType>,
    pub parent: Option<String>,
    pub model: Option<Model>,
    pub description: Option<String>,
    pub prompt: String,
}

impl SeedAgent {
    fn into_new_agent(self) -> Result<NewAgent, SeedFileError> {
        let invalid = |reason: &str| SeedFileError::InvalidAgent {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(invalid("prompt is empty"));
        }
        let id = match &self.id {
            Some(id) => AgentId::parse(id).map_err(|e| invalid(&e.to_string()))?,
            None => AgentId::from_name(&self.name),
        };

        let domain = self.domain.unwrap_or(if self.rank.is_leader() {
            DomainType::Command
        } else {
            DomainType::default()
        });
        let mut agent = NewAgent::soldier(self.name.trim(), self.prompt.trim())
            .with_id(id)
            .with_rank(self.rank)
            .with_domain(domain);
        if let Some(parent) = self.parent {
            agent = agent.with_parent(parent.trim());
        }
        if let Some(model) = self.model {
            agent = agent.with_model(model);
        }
        if let Some(description) = self.description {
            agent = agent.with_description(description);
        }
        Ok(agent)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub config: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub agents: Vec<SeedAgent>,
}

impl SeedFile {
    pub fn parse(text: &str) -> Result<Self, SeedFileError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SeedFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// The roster shipped with hq
    pub fn builtin() -> Result<Self, SeedFileError> {
        Self::parse(BUILTIN_ROSTER)
    }

    pub fn into_input(self) -> Result<SeedInput, SeedFileError> {
        let config = self
            .config
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        let agents = self
            .agents
            .into_iter()
            .map(SeedAgent::into_new_agent)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SeedInput { agents, config })
    }
}
