//! Hierarchy persistence port
//!
//! Key/value system config, agents, and append-only prompt versions.
//!
//! # Atomicity
//!
//! [`append_prompt_version`](HierarchyRepository::append_prompt_version) and
//! [`activate_prompt_version`](HierarchyRepository::activate_prompt_version)
//! must each be a single atomic unit (one lock or one transaction): every
//! other version of the agent is deactivated, the target becomes active, and
//! the agent's `current_prompt` mirror is updated. New version numbers are
//! assigned inside that unit as `MAX(version) + 1`, never from a value the
//! caller read earlier.

use super::store_error::StoreError;
use hq_domain::{Agent, AgentId, NewAgent, PromptVersion};

/// Text and provenance of a version about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromptVersion {
    pub text: String,
    pub notes: String,
    pub author: String,
}

impl NewPromptVersion {
    pub fn new(text: impl Into<String>, notes: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            notes: notes.into(),
            author: author.into(),
        }
    }
}

pub trait HierarchyRepository: Send + Sync {
    // ==================== System config ====================

    fn get_config(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn list_config(&self) -> Result<Vec<(String, String)>, StoreError>;

    // ==================== Agents ====================

    fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError>;

    /// Insert an agent together with its version 1 (atomic).
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the id is taken.
    fn insert_agent(&self, agent: &NewAgent, initial: NewPromptVersion) -> Result<Agent, StoreError>;

    /// Returns `false` when the agent does not exist
    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<bool, StoreError>;

    /// Update display metadata; `None` leaves a field untouched
    fn update_agent_metadata(
        &self,
        id: &AgentId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), StoreError>;

    // ==================== Prompt versions ====================

    /// Append a new active version (atomic, see module docs)
    fn append_prompt_version(
        &self,
        id: &AgentId,
        version: NewPromptVersion,
    ) -> Result<PromptVersion, StoreError>;

    /// Re-activate an existing version (atomic, see module docs)
    fn activate_prompt_version(&self, id: &AgentId, version: u32)
    -> Result<PromptVersion, StoreError>;

    /// All versions of an agent, oldest first
    fn list_prompt_versions(&self, id: &AgentId) -> Result<Vec<PromptVersion>, StoreError>;
}
