//! Progress notification port
//!
//! Defines the interface for reporting stage progress during a command
//! pipeline run.

use hq_domain::{AgentId, Stage, StageRecord};

/// Callback for stage updates during a pipeline run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (spinner, plain log lines, etc.)
pub trait StageObserver: Send + Sync {
    /// Called when a stage starts
    fn on_stage_start(&self, stage: Stage);

    /// Called once per stage with its final record
    fn on_stage_complete(&self, record: &StageRecord);

    /// Called as each self-write call finishes
    fn on_self_write_complete(&self, _agent_id: &AgentId, _success: bool) {}
}

/// No-op observer for when progress reporting is not needed
pub struct NoProgress;

impl StageObserver for NoProgress {
    fn on_stage_start(&self, _stage: Stage) {}
    fn on_stage_complete(&self, _record: &StageRecord) {}
}
