//! Proposed changes parsed from a Lieutenant's reply

use crate::core::model::Model;
use crate::hierarchy::entities::DomainType;
use crate::hierarchy::value_objects::AgentId;
use serde::{Deserialize, Serialize};

/// What a change does to the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Rewrite an existing agent's prompt document
    #[default]
    Update,
    /// Administrative: add a new soldier
    CreateAgent,
    /// Administrative: soft-deactivate an agent
    DeactivateAgent,
}

impl ChangeAction {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeAction::Update => "update",
            ChangeAction::CreateAgent => "create_agent",
            ChangeAction::DeactivateAgent => "deactivate_agent",
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, ChangeAction::Update)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed instruction to replace, guide, create or retire one agent.
///
/// Replacement text and guidance may coexist until the self-write stage
/// resolves guidance into replacement text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProposedChange {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub action: ChangeAction,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<DomainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AgentId>,
    /// `new_prompt` was produced by the agent itself from `guidance`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub self_written: bool,
}

impl ProposedChange {
    /// An update carrying finished replacement text
    pub fn replace(agent_id: impl Into<AgentId>, new_prompt: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            new_prompt: Some(new_prompt.into()),
            ..Default::default()
        }
    }

    /// An update carrying only guidance for a self-write
    pub fn guide(agent_id: impl Into<AgentId>, guidance: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            guidance: Some(guidance.into()),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: ChangeAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn replacement(&self) -> Option<&str> {
        non_blank(self.new_prompt.as_deref())
    }

    pub fn guidance_text(&self) -> Option<&str> {
        non_blank(self.guidance.as_deref())
    }

    /// A change survives parsing only with a target and something to apply.
    ///
    /// Deactivation needs nothing beyond the target.
    pub fn is_valid(&self) -> bool {
        if self.agent_id.is_empty() {
            return false;
        }
        match self.action {
            ChangeAction::DeactivateAgent => true,
            ChangeAction::CreateAgent => self.replacement().is_some(),
            ChangeAction::Update => self.replacement().is_some() || self.guidance_text().is_some(),
        }
    }

    /// Guidance without finished text: the agent must rewrite itself
    pub fn needs_self_write(&self) -> bool {
        self.action == ChangeAction::Update
            && self.replacement().is_none()
            && self.guidance_text().is_some()
    }

    /// Name used in listings: explicit agent name, else the id
    pub fn display_name(&self) -> &str {
        self.agent_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.agent_id.as_str())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
