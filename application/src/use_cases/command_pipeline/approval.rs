//! Auto-approve gate, commit logic, and the manual approval path.
//!
//! [`CommandPipeline::apply_pending_changes`] and the auto-approve branch of
//! `submit_command` share [`CommandPipeline::commit_changes`], so a manually
//! approved order commits exactly as an auto-approved one would.

use super::types::{Halt, PipelineError};
use super::{CommandPipeline, Run, storage_halt};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::StageObserver;
use crate::use_cases::hierarchy_service::{
    HierarchyError, HierarchyMutation, HierarchyService, MutationOutcome,
};
use chrono::Utc;
use hq_domain::{
    AUTO_APPROVE, ChangeAction, ChangeDisposition, ChangeOutcome, FailureKind, NewAgent, Order,
    OrderId, OrderResult, OrderStatus, OrderUpdate, PipelineFailure, ProposedChange, Stage,
    StageOutcome, StageRecord, extract_metadata, parse_bool,
};
use std::time::Instant;
use tracing::{info, warn};

/// Author recorded on versions produced by an agent rewriting itself
pub const SELF_WRITE_AUTHOR: &str = "self-write";

/// Decides whether accepted changes are committed immediately.
///
/// Precedence: per-request override, then the persisted `auto_approve`
/// value, then the configured default.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalGate {
    configured: bool,
}

impl ApprovalGate {
    pub fn new(configured: bool) -> Self {
        Self { configured }
    }

    pub fn resolve(&self, request_override: Option<bool>, stored: Option<&str>) -> bool {
        request_override
            .or_else(|| stored.and_then(parse_bool))
            .unwrap_or(self.configured)
    }

    /// [`resolve`](Self::resolve) against the persisted config
    pub fn decide(&self, request_override: Option<bool>, hierarchy: &HierarchyService) -> bool {
        if let Some(value) = request_override {
            return value;
        }
        let stored = hierarchy.config_value(AUTO_APPROVE).unwrap_or_else(|e| {
            warn!("Could not read auto_approve, using configured value: {}", e);
            None
        });
        self.resolve(None, stored.as_deref())
    }
}

impl<G: LlmGateway + 'static> CommandPipeline<G> {
    pub(super) fn approval_gate(&self) -> ApprovalGate {
        ApprovalGate::new(self.config.auto_approve)
    }

    /// Manual approval: commit a pending order's recorded changes.
    pub fn apply_pending_changes(
        &self,
        order_id: &OrderId,
        progress: &dyn StageObserver,
    ) -> Result<OrderResult, PipelineError> {
        let order = self.open_order(order_id)?;
        if order.changes.is_empty() {
            return Err(PipelineError::NothingToApply(*order_id));
        }
        info!(
            "Applying {} pending changes of order {}",
            order.changes.len(),
            order_id
        );

        let changes = order.changes.clone();
        let mut run = Run::new(order, progress);

        let started = run.start(Stage::Approval);
        let approved = OrderUpdate::status(OrderStatus::Approved);
        approved.clone().apply_to(&mut run.result.order);
        self.orders.update_order(order_id, approved)?;
        run.finish(
            Stage::Approval,
            started,
            StageOutcome::Success,
            "approved by operator",
        );

        let committed = self
            .commit_changes(&mut run, &changes)
            .and_then(|()| self.persist(&mut run, OrderUpdate::executed(Utc::now())));
        if let Err(halt) = committed {
            self.finalize(&mut run, halt);
        }
        Ok(run.result)
    }

    /// Mark an open order rejected without touching the hierarchy
    pub fn reject_order(&self, order_id: &OrderId) -> Result<Order, PipelineError> {
        self.open_order(order_id)?;
        let order = self
            .orders
            .update_order(order_id, OrderUpdate::rejected("rejected by operator"))?;
        info!("Order {} rejected by operator", order_id);
        Ok(order)
    }

    fn open_order(&self, order_id: &OrderId) -> Result<Order, PipelineError> {
        let order = self
            .orders
            .get_order(order_id)?
            .ok_or(PipelineError::OrderNotFound(*order_id))?;
        if order.status.is_terminal() {
            return Err(PipelineError::OrderClosed {
                id: *order_id,
                status: order.status,
            });
        }
        Ok(order)
    }

    /// Commit every change, then run one chain-of-command sync.
    ///
    /// Updates become new prompt versions (plus any extracted metadata);
    /// creations and deactivations go through one hierarchy batch, which
    /// carries the single sync even when it holds no mutations.
    pub(super) fn commit_changes(
        &self,
        run: &mut Run<'_>,
        changes: &[ProposedChange],
    ) -> Result<(), Halt> {
        let started = run.start(Stage::Commit);
        let order_id = run.result.order.id;
        let author = run
            .result
            .order
            .lieutenant_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "operator".to_string());

        let mut outcomes: Vec<Option<ChangeOutcome>> = vec![None; changes.len()];
        let mut mutations = Vec::new();
        let mut mutation_slots = Vec::new();

        for (slot, change) in changes.iter().enumerate() {
            match change.action {
                ChangeAction::Update => {
                    let outcome = match self.commit_update(change, &order_id, &author) {
                        Ok(outcome) => outcome,
                        Err(HierarchyError::AgentNotFound(id)) => ChangeOutcome::from_change(
                            change,
                            ChangeDisposition::Dropped {
                                reason: format!("unknown agent {}", id),
                            },
                        ),
                        Err(e) => {
                            run.finish(Stage::Commit, started, StageOutcome::Failed, e.to_string());
                            return Err(storage_halt(e.to_string()));
                        }
                    };
                    outcomes[slot] = Some(outcome);
                }
                ChangeAction::CreateAgent => {
                    mutations.push(HierarchyMutation::CreateAgent {
                        agent: new_agent_from(change),
                        author: author.clone(),
                    });
                    mutation_slots.push(slot);
                }
                ChangeAction::DeactivateAgent => {
                    mutations.push(HierarchyMutation::DeactivateAgent(change.agent_id.clone()));
                    mutation_slots.push(slot);
                }
            }
        }

        let batch_started = Instant::now();
        let batch = match self.hierarchy.apply_batch(mutations) {
            Ok(batch) => batch,
            Err(e) => {
                run.finish(Stage::Commit, started, StageOutcome::Failed, e.to_string());
                return Err(storage_halt(e.to_string()));
            }
        };

        for (slot, outcome) in mutation_slots.into_iter().zip(batch.outcomes) {
            let change = &changes[slot];
            outcomes[slot] = Some(match outcome {
                MutationOutcome::Created(agent) => {
                    ChangeOutcome::from_change(change, ChangeDisposition::Committed { version: 1 })
                        .with_after(Some(agent.current_prompt))
                }
                MutationOutcome::Deactivated(_) => {
                    ChangeOutcome::from_change(change, ChangeDisposition::Deactivated)
                }
                MutationOutcome::Refused { reason, .. } => {
                    ChangeOutcome::from_change(change, ChangeDisposition::Refused { reason })
                }
            });
        }

        let outcomes: Vec<ChangeOutcome> = outcomes.into_iter().flatten().collect();
        let committed = outcomes.iter().filter(|o| o.disposition.is_committed()).count();
        for outcome in &outcomes {
            match &outcome.disposition {
                ChangeDisposition::Refused { reason } => run.fail(PipelineFailure::new(
                    FailureKind::InvariantViolation,
                    format!("{}: {}", outcome.agent_id, reason),
                )),
                ChangeDisposition::Dropped { reason } => run.fail(PipelineFailure::new(
                    FailureKind::UnknownAgentReference,
                    reason.clone(),
                )),
                _ => {}
            }
        }

        let outcome = match committed {
            n if n == outcomes.len() => StageOutcome::Success,
            0 => StageOutcome::Failed,
            _ => StageOutcome::Partial,
        };
        run.finish(
            Stage::Commit,
            started,
            outcome,
            format!("{} of {} committed", committed, outcomes.len()),
        );
        run.result.changes.extend(outcomes);

        // The sync ran inside the batch; report it as its own stage
        run.progress.on_stage_start(Stage::Sync);
        let record = StageRecord::new(
            Stage::Sync,
            StageOutcome::Success,
            format!(
                "{} of {} leaders updated",
                batch.sync.versions_created, batch.sync.agents_examined
            ),
        )
        .with_elapsed(batch_started.elapsed());
        run.progress.on_stage_complete(&record);
        run.result.stages.push(record);
        run.result.sync = Some(batch.sync);
        Ok(())
    }

    fn commit_update(
        &self,
        change: &ProposedChange,
        order_id: &OrderId,
        author: &str,
    ) -> Result<ChangeOutcome, HierarchyError> {
        let Some(text) = change.replacement() else {
            return Ok(ChangeOutcome::from_change(
                change,
                ChangeDisposition::Dropped {
                    reason: "no replacement text".to_string(),
                },
            ));
        };
        let agent = self
            .hierarchy
            .agent(&change.agent_id)?
            .ok_or_else(|| HierarchyError::AgentNotFound(change.agent_id.clone()))?;

        let author = if change.self_written {
            SELF_WRITE_AUTHOR
        } else {
            author
        };
        let notes = if change.description.trim().is_empty() {
            format!("Order {}", order_id)
        } else {
            format!("Order {}: {}", order_id, change.description.trim())
        };
        let version = self
            .hierarchy
            .create_prompt_version(&agent.id, text, &notes, author)?;

        let metadata = extract_metadata(change);
        let name = metadata.name.as_deref().filter(|n| *n != agent.name);
        let description = metadata
            .description
            .as_deref()
            .filter(|d| agent.description.as_deref() != Some(*d));
        self.hierarchy.update_metadata(&agent.id, name, description)?;

        Ok(
            ChangeOutcome::from_change(
                change,
                ChangeDisposition::Committed {
                    version: version.version,
                },
            )
            .with_before(Some(agent.current_prompt)),
        )
    }
}

fn new_agent_from(change: &ProposedChange) -> NewAgent {
    let name = change
        .new_name
        .clone()
        .or_else(|| change.agent_name.clone())
        .unwrap_or_else(|| change.agent_id.to_string());
    let mut agent = NewAgent::soldier(name, change.replacement().unwrap_or_default())
        .with_id(change.agent_id.clone())
        .with_domain(change.domain_type.clone().unwrap_or_default());
    if let Some(parent) = &change.parent_id {
        agent = agent.with_parent(parent.clone());
    }
    if let Some(model) = &change.model {
        agent = agent.with_model(model.clone());
    }
    if let Some(description) = &change.new_description {
        agent = agent.with_description(description.clone());
    }
    agent
}
