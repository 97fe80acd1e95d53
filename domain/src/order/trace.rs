//! Structured trace of a pipeline run
//!
//! Every stage emits a [`StageRecord`]; failures are recorded as values
//! ([`PipelineFailure`]) instead of aborting the run, so an operator can see
//! where the chain halted and why.

use super::change::{ChangeAction, ProposedChange};
use super::entities::{Order, OrderStatus};
use crate::delegation::Delegation;
use crate::hierarchy::value_objects::AgentId;
use crate::proposal::ParseStrategy;
use serde::{Deserialize, Serialize};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    General,
    Delegation,
    Lieutenant,
    Parse,
    Validate,
    SelfWrite,
    Approval,
    Commit,
    Sync,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::General => "general",
            Stage::Delegation => "delegation",
            Stage::Lieutenant => "lieutenant",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
            Stage::SelfWrite => "self_write",
            Stage::Approval => "approval",
            Stage::Commit => "commit",
            Stage::Sync => "sync",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Stage::General => "General",
            Stage::Delegation => "Delegation",
            Stage::Lieutenant => "Lieutenant",
            Stage::Parse => "Parse",
            Stage::Validate => "Validate",
            Stage::SelfWrite => "Self-Write",
            Stage::Approval => "Approval",
            Stage::Commit => "Commit",
            Stage::Sync => "Sync",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Success,
    /// Completed with isolated failures or a soft miss
    Partial,
    Skipped,
    Failed,
}

impl StageOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Partial => "partial",
            StageOutcome::Skipped => "skipped",
            StageOutcome::Failed => "failed",
        }
    }
}

/// Observability record emitted once per stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Strategy, provenance or error summary
    pub detail: String,
    pub elapsed_ms: u64,
}

impl StageRecord {
    pub fn new(stage: Stage, outcome: StageOutcome, detail: impl Into<String>) -> Self {
        Self {
            stage,
            outcome,
            detail: detail.into(),
            elapsed_ms: 0,
        }
    }

    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Error taxonomy of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Primary and fallback model calls both failed
    UpstreamModel,
    /// No parser strategy produced a change (soft)
    ParseExhausted,
    /// A change named an agent absent from the store; the change was dropped
    UnknownAgentReference,
    /// A forbidden hierarchy mutation was refused
    InvariantViolation,
    /// Some self-write calls failed
    PartialStage,
    Storage,
    /// A required General or Lieutenant is missing or inactive
    MissingAgent,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::UpstreamModel => "upstream_model",
            FailureKind::ParseExhausted => "parse_exhausted",
            FailureKind::UnknownAgentReference => "unknown_agent_reference",
            FailureKind::InvariantViolation => "invariant_violation",
            FailureKind::PartialStage => "partial_stage",
            FailureKind::Storage => "storage",
            FailureKind::MissingAgent => "missing_agent",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Soft failures leave the order open for human follow-up
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            FailureKind::ParseExhausted
                | FailureKind::UnknownAgentReference
                | FailureKind::InvariantViolation
                | FailureKind::PartialStage
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// What happened to one proposed change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeDisposition {
    /// Written to the store; `version` is the new active version
    Committed { version: u32 },
    /// Agent soft-deactivated
    Deactivated,
    /// Recorded on the order, awaiting approval
    Pending,
    /// Rejected before commit (unknown agent, duplicate id)
    Dropped { reason: String },
    /// Refused by the hierarchy (e.g. deactivating a leader)
    Refused { reason: String },
    SelfWriteFailed { error: String },
}

impl ChangeDisposition {
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            ChangeDisposition::Committed { .. } | ChangeDisposition::Deactivated
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChangeDisposition::Committed { .. } => "committed",
            ChangeDisposition::Deactivated => "deactivated",
            ChangeDisposition::Pending => "pending",
            ChangeDisposition::Dropped { .. } => "dropped",
            ChangeDisposition::Refused { .. } => "refused",
            ChangeDisposition::SelfWriteFailed { .. } => "self_write_failed",
        }
    }
}

/// Per-agent before/after record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub agent_id: AgentId,
    pub agent_name: Option<String>,
    pub action: ChangeAction,
    pub description: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub disposition: ChangeDisposition,
}

impl ChangeOutcome {
    pub fn from_change(change: &ProposedChange, disposition: ChangeDisposition) -> Self {
        Self {
            agent_id: change.agent_id.clone(),
            agent_name: change.agent_name.clone(),
            action: change.action,
            description: change.description.clone(),
            before: None,
            after: change.new_prompt.clone(),
            disposition,
        }
    }

    pub fn with_before(mut self, before: Option<String>) -> Self {
        self.before = before;
        self
    }

    pub fn with_after(mut self, after: Option<String>) -> Self {
        self.after = after;
        self
    }
}

/// Result of a chain-of-command sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Active leaders whose block was recomputed
    pub agents_examined: usize,
    /// Leaders whose text actually changed
    pub versions_created: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.versions_created == 0
    }
}

/// Full structured trace returned by every pipeline entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Final state of the order
    pub order: Order,
    pub delegation: Option<Delegation>,
    pub parse_strategy: Option<ParseStrategy>,
    pub changes: Vec<ChangeOutcome>,
    pub sync: Option<SyncReport>,
    pub stages: Vec<StageRecord>,
    pub failures: Vec<PipelineFailure>,
}

impl OrderResult {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            delegation: None,
            parse_strategy: None,
            changes: Vec::new(),
            sync: None,
            stages: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.order.status
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn committed(&self) -> impl Iterator<Item = &ChangeOutcome> {
        self.changes.iter().filter(|c| c.disposition.is_committed())
    }
}
