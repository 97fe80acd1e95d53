//! Command pipeline use case
//!
//! Turns one operator command into an [`Order`] and drives it down the chain
//! of command:
//!
//! | Stage          | On failure                                  |
//! |----------------|---------------------------------------------|
//! | 1. General     | order rejected                              |
//! | 2. Delegation  | never fails; uncertain routing is `partial` |
//! | 3. Lieutenant  | order stays pending with the error recorded |
//! | 4. Parse       | soft: pending, empty change set             |
//! | 5. Validate    | unknown agents dropped per change           |
//! | 6. Self-Write  | failed agents dropped per change            |
//! | 7. Approval    | off: pending, changes recorded              |
//! | 8. Commit/Sync | one sync for the whole batch                |
//!
//! Cancellation between or during stages rejects the order as aborted.

mod approval;
mod types;

pub use approval::{ApprovalGate, SELF_WRITE_AUTHOR};
pub use types::{PipelineError, SubmitCommandInput};

use types::Halt;

use crate::config::PipelineConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::llm_gateway::{GatewayError, LlmGateway, ModelRequest};
use crate::ports::order_repository::OrderRepository;
use crate::ports::progress::StageObserver;
use crate::use_cases::hierarchy_service::HierarchyService;
use crate::use_cases::self_write::{SelfWriteOutcome, SelfWriteStage, SelfWriteTask};
use chrono::Utc;
use hq_domain::{
    Agent, AgentId, AliasTable, ChangeAction, ChangeDisposition, ChangeOutcome, FailureKind,
    Model, Order, OrderId, OrderResult, OrderUpdate, PipelineFailure, PromptTemplate,
    ProposedChange, Stage, StageOutcome, StageRecord, extract_forwarded_order, parse_proposals,
    resolve_delegation,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Use case for submitting operator commands and approving their orders
pub struct CommandPipeline<G: LlmGateway + 'static> {
    pub(super) gateway: Arc<G>,
    pub(super) hierarchy: Arc<HierarchyService>,
    pub(super) orders: Arc<dyn OrderRepository>,
    pub(super) config: PipelineConfig,
    pub(super) aliases: AliasTable,
    pub(super) conversation_logger: Arc<dyn ConversationLogger>,
}

impl<G: LlmGateway + 'static> CommandPipeline<G> {
    pub fn new(
        gateway: Arc<G>,
        hierarchy: Arc<HierarchyService>,
        orders: Arc<dyn OrderRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            hierarchy,
            orders,
            config,
            aliases: AliasTable::builtin(),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &Arc<HierarchyService> {
        &self.hierarchy
    }

    pub fn order(&self, id: &OrderId) -> Result<Option<Order>, PipelineError> {
        Ok(self.orders.get_order(id)?)
    }

    /// Most recent first
    pub fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, PipelineError> {
        Ok(self.orders.list_orders(limit)?)
    }

    /// Run a command through the whole chain of command.
    ///
    /// Always returns a trace; failures are recorded on it rather than
    /// returned as errors.
    pub async fn submit_command(
        &self,
        input: SubmitCommandInput,
        progress: &dyn StageObserver,
        cancellation: &CancellationToken,
    ) -> OrderResult {
        let order = Order::new(input.command.content());
        info!("Order {} created: {}", order.id, input.command);
        let mut run = Run::new(order, progress);

        if let Err(e) = self.orders.insert_order(&run.result.order) {
            warn!("Failed to record order {}: {}", run.result.order.id, e);
            run.result
                .failures
                .push(PipelineFailure::new(FailureKind::Storage, e.to_string()));
            return run.result;
        }
        self.conversation_logger.log(ConversationEvent::new(
            "order_created",
            serde_json::json!({
                "order_id": run.result.order.id.to_string(),
                "command": input.command.content(),
            }),
        ));

        if let Err(halt) = self.drive(&input, &mut run, cancellation).await {
            self.finalize(&mut run, halt);
        }

        let order = &run.result.order;
        info!("Order {} finished as {}", order.id, order.status);
        self.conversation_logger.log(ConversationEvent::new(
            "order_finalized",
            serde_json::json!({
                "order_id": order.id.to_string(),
                "status": order.status.as_str(),
                "affected_agents": order.affected_agents.iter().map(AgentId::as_str).collect::<Vec<_>>(),
                "failures": run.result.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
            }),
        ));
        run.result
    }

    async fn drive(
        &self,
        input: &SubmitCommandInput,
        run: &mut Run<'_>,
        cancellation: &CancellationToken,
    ) -> Result<(), Halt> {
        let auto_approve = self.approval_gate().decide(input.auto_approve, &self.hierarchy);
        let default_model = self.default_model();

        // ==================== 1. General ====================
        check_cancelled(cancellation)?;
        let started = run.start(Stage::General);
        let general = self
            .active_agent(&self.config.general_id)
            .inspect_err(|f| run.finish(Stage::General, started, StageOutcome::Failed, &f.message))
            .map_err(Halt::Reject)?;

        let general_reply = match self
            .call_agent(
                Stage::General,
                &general,
                PromptTemplate::general_command(input.command.content()),
                &default_model,
                cancellation,
            )
            .await
        {
            Ok(reply) => reply,
            Err(failure) => {
                run.finish(Stage::General, started, StageOutcome::Failed, failure.to_string());
                return Err(failure.into_halt("General", Halt::Reject));
            }
        };
        run.finish(
            Stage::General,
            started,
            StageOutcome::Success,
            general.model_or(&default_model).to_string(),
        );

        // ==================== 2. Delegation ====================
        let started = run.start(Stage::Delegation);
        let delegation = resolve_delegation(&general_reply, &self.config.divisions);
        let forwarded = extract_forwarded_order(&general_reply);
        let outcome = if delegation.provenance.is_uncertain() {
            StageOutcome::Partial
        } else {
            StageOutcome::Success
        };
        run.finish(
            Stage::Delegation,
            started,
            outcome,
            format!(
                "{} -> {} ({})",
                delegation.division, delegation.lieutenant_id, delegation.provenance
            ),
        );
        run.result.delegation = Some(delegation.clone());
        self.persist(
            run,
            OrderUpdate {
                general_reply: Some(general_reply),
                lieutenant_id: Some(delegation.lieutenant_id.clone()),
                delegation_provenance: Some(delegation.provenance.clone()),
                forwarded_order: Some(forwarded.clone()),
                ..Default::default()
            },
        )?;

        // ==================== 3. Lieutenant ====================
        check_cancelled(cancellation)?;
        let started = run.start(Stage::Lieutenant);
        let (lieutenant, soldiers) = self
            .active_agent(&delegation.lieutenant_id)
            .and_then(|lieutenant| {
                let soldiers = self
                    .hierarchy
                    .soldiers_of(&lieutenant.id)
                    .map_err(|e| PipelineFailure::new(FailureKind::Storage, e.to_string()))?;
                Ok((lieutenant, soldiers))
            })
            .inspect_err(|f| run.finish(Stage::Lieutenant, started, StageOutcome::Failed, &f.message))
            .map_err(Halt::Hold)?;

        let roster_refs: Vec<&Agent> = soldiers.iter().collect();
        let lieutenant_reply = match self
            .call_agent(
                Stage::Lieutenant,
                &lieutenant,
                PromptTemplate::lieutenant_order(&forwarded, &roster_refs),
                &default_model,
                cancellation,
            )
            .await
        {
            Ok(reply) => reply,
            Err(failure) => {
                run.finish(Stage::Lieutenant, started, StageOutcome::Failed, failure.to_string());
                return Err(failure.into_halt("Lieutenant", Halt::Hold));
            }
        };
        run.finish(
            Stage::Lieutenant,
            started,
            StageOutcome::Success,
            format!("{} soldiers briefed", soldiers.len()),
        );
        self.persist(
            run,
            OrderUpdate {
                lieutenant_reply: Some(lieutenant_reply.clone()),
                ..Default::default()
            },
        )?;

        // ==================== 4. Parse ====================
        let started = run.start(Stage::Parse);
        let roster = self.hierarchy.agents().map_err(|e| storage_halt(e.to_string()))?;
        let aliases = self.aliases.clone().extend_with_agents(&roster);
        let parsed = parse_proposals(&lieutenant_reply, &aliases);
        run.result.parse_strategy = parsed.strategy;

        let Some(strategy) = parsed.strategy else {
            run.finish(Stage::Parse, started, StageOutcome::Partial, "no strategy matched");
            self.persist(
                run,
                OrderUpdate {
                    changes: Some(Vec::new()),
                    affected_agents: Some(Vec::new()),
                    ..Default::default()
                },
            )?;
            return Err(Halt::Hold(PipelineFailure::new(
                FailureKind::ParseExhausted,
                "Lieutenant reply contained no parseable changes",
            )));
        };
        run.finish(
            Stage::Parse,
            started,
            StageOutcome::Success,
            format!(
                "{} ({} changes, {} discarded)",
                strategy,
                parsed.changes.len(),
                parsed.discarded
            ),
        );

        // ==================== 5. Validate ====================
        let accepted = self.validate(run, parsed.changes, &roster, &lieutenant.id);

        // ==================== 6. Self-Write ====================
        check_cancelled(cancellation)?;
        let accepted = self
            .run_self_writes(run, accepted, &roster, &default_model, cancellation)
            .await?;

        let affected: Vec<AgentId> = accepted
            .iter()
            .map(|c| c.agent_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.persist(
            run,
            OrderUpdate {
                changes: Some(accepted.clone()),
                affected_agents: Some(affected),
                ..Default::default()
            },
        )?;

        // ==================== 7. Approval ====================
        let started = run.start(Stage::Approval);
        if accepted.is_empty() {
            run.finish(Stage::Approval, started, StageOutcome::Skipped, "no changes to commit");
            return Ok(());
        }
        if !auto_approve {
            for change in &accepted {
                let before = roster
                    .iter()
                    .find(|a| a.id == change.agent_id)
                    .map(|a| a.current_prompt.clone());
                run.result.changes.push(
                    ChangeOutcome::from_change(change, ChangeDisposition::Pending)
                        .with_before(before),
                );
            }
            run.finish(
                Stage::Approval,
                started,
                StageOutcome::Success,
                "awaiting manual approval",
            );
            return Ok(());
        }
        run.finish(Stage::Approval, started, StageOutcome::Success, "auto-approved");

        // ==================== 8. Commit + Sync ====================
        check_cancelled(cancellation)?;
        self.commit_changes(run, &accepted)?;
        self.persist(run, OrderUpdate::executed(Utc::now()))
    }

    /// Drop changes that reference agents the store does not know
    fn validate(
        &self,
        run: &mut Run<'_>,
        changes: Vec<ProposedChange>,
        roster: &[Agent],
        lieutenant_id: &AgentId,
    ) -> Vec<ProposedChange> {
        let started = run.start(Stage::Validate);
        let total = changes.len();
        let mut creating: BTreeSet<AgentId> = BTreeSet::new();
        let mut accepted = Vec::with_capacity(total);

        for mut change in changes {
            let known = roster.iter().find(|a| a.id == change.agent_id);
            let problem = match (change.action, known) {
                (ChangeAction::CreateAgent, Some(_)) => {
                    Some(format!("agent {} already exists", change.agent_id))
                }
                (ChangeAction::CreateAgent, None) if !creating.insert(change.agent_id.clone()) => {
                    Some(format!("agent {} proposed twice", change.agent_id))
                }
                (ChangeAction::CreateAgent, None) => {
                    change.parent_id.get_or_insert_with(|| lieutenant_id.clone());
                    None
                }
                (_, None) => Some(format!("unknown agent {}", change.agent_id)),
                (ChangeAction::Update, Some(agent)) if !agent.active => {
                    Some(format!("agent {} is inactive", change.agent_id))
                }
                _ => None,
            };

            match problem {
                Some(reason) => {
                    run.fail(PipelineFailure::new(
                        FailureKind::UnknownAgentReference,
                        reason.clone(),
                    ));
                    run.result.changes.push(ChangeOutcome::from_change(
                        &change,
                        ChangeDisposition::Dropped { reason },
                    ));
                }
                None => accepted.push(change),
            }
        }

        let dropped = total - accepted.len();
        let outcome = match (dropped, accepted.len()) {
            (0, _) => StageOutcome::Success,
            (_, 0) => StageOutcome::Failed,
            _ => StageOutcome::Partial,
        };
        run.finish(
            Stage::Validate,
            started,
            outcome,
            format!("{} accepted, {} dropped", accepted.len(), dropped),
        );
        accepted
    }

    async fn run_self_writes(
        &self,
        run: &mut Run<'_>,
        mut accepted: Vec<ProposedChange>,
        roster: &[Agent],
        default_model: &Model,
        cancellation: &CancellationToken,
    ) -> Result<Vec<ProposedChange>, Halt> {
        let started = run.start(Stage::SelfWrite);
        let tasks: Vec<SelfWriteTask> = accepted
            .iter()
            .enumerate()
            .filter(|(_, c)| c.needs_self_write())
            .filter_map(|(index, change)| {
                let agent = roster.iter().find(|a| a.id == change.agent_id)?;
                Some(SelfWriteTask {
                    index,
                    agent: agent.clone(),
                    guidance: change.guidance_text()?.to_string(),
                })
            })
            .collect();

        if tasks.is_empty() {
            run.finish(Stage::SelfWrite, started, StageOutcome::Skipped, "no guidance-only changes");
            return Ok(accepted);
        }

        let total = tasks.len();
        let stage = SelfWriteStage::new(
            Arc::clone(&self.gateway),
            self.config.self_write_concurrency,
            default_model.clone(),
        )
        .with_limits(self.config.max_tokens, self.config.temperature);
        let progress = run.progress;
        let outcomes = stage.run(tasks, progress, cancellation).await;

        let mut failed: BTreeSet<usize> = BTreeSet::new();
        for outcome in outcomes {
            match outcome {
                SelfWriteOutcome::Written { index, text, .. } => {
                    accepted[index].new_prompt = Some(text);
                    accepted[index].self_written = true;
                }
                SelfWriteOutcome::Failed { index, error, .. } => {
                    run.result.changes.push(ChangeOutcome::from_change(
                        &accepted[index],
                        ChangeDisposition::SelfWriteFailed { error },
                    ));
                    failed.insert(index);
                }
                SelfWriteOutcome::Cancelled { .. } => {
                    run.finish(Stage::SelfWrite, started, StageOutcome::Failed, "cancelled");
                    return Err(cancelled_halt());
                }
            }
        }

        let outcome = match failed.len() {
            0 => StageOutcome::Success,
            n if n == total => StageOutcome::Failed,
            _ => StageOutcome::Partial,
        };
        run.finish(
            Stage::SelfWrite,
            started,
            outcome,
            format!("{} of {} rewritten", total - failed.len(), total),
        );
        if !failed.is_empty() {
            run.fail(PipelineFailure::new(
                FailureKind::PartialStage,
                format!("{} of {} self-writes failed", failed.len(), total),
            ));
        }

        Ok(accepted
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !failed.contains(index))
            .map(|(_, change)| change)
            .collect())
    }

    // ==================== Helpers ====================

    /// Default model: persisted `default_model` over the configured one
    fn default_model(&self) -> Model {
        match self.hierarchy.config_value(hq_domain::DEFAULT_MODEL) {
            Ok(Some(value)) if !value.trim().is_empty() => {
                let Ok(model) = value.parse::<Model>();
                model
            }
            Ok(_) => self.config.default_model.clone(),
            Err(e) => {
                warn!("Could not read default_model, using configured value: {}", e);
                self.config.default_model.clone()
            }
        }
    }

    fn active_agent(&self, id: &AgentId) -> Result<Agent, PipelineFailure> {
        match self.hierarchy.agent(id) {
            Ok(Some(agent)) if agent.active => Ok(agent),
            Ok(Some(_)) => Err(PipelineFailure::new(
                FailureKind::MissingAgent,
                format!("agent {} is inactive", id),
            )),
            Ok(None) => Err(PipelineFailure::new(
                FailureKind::MissingAgent,
                format!("agent {} does not exist", id),
            )),
            Err(e) => Err(PipelineFailure::new(FailureKind::Storage, e.to_string())),
        }
    }

    /// One model call with the agent's document as system prompt
    async fn call_agent(
        &self,
        stage: Stage,
        agent: &Agent,
        user_prompt: String,
        default_model: &Model,
        cancellation: &CancellationToken,
    ) -> Result<String, CallFailure> {
        let request = ModelRequest::new(agent.model_or(default_model))
            .system(&agent.current_prompt)
            .user(user_prompt)
            .with_limits(self.config.max_tokens, self.config.temperature);
        debug!("{} call to {} via {}", stage, agent.id, request.model);
        self.conversation_logger.log(ConversationEvent::new(
            "model_request",
            serde_json::json!({
                "stage": stage.as_str(),
                "agent_id": agent.id.as_str(),
                "model": request.model.to_string(),
                "prompt": request.last_user_message(),
            }),
        ));

        let reply = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(CallFailure::Cancelled),
            reply = self.gateway.complete(&request) => reply,
        };
        let reply = reply.and_then(|text| {
            if text.trim().is_empty() {
                Err(GatewayError::EmptyResponse)
            } else {
                Ok(text)
            }
        });

        match &reply {
            Ok(text) => self.conversation_logger.log(ConversationEvent::new(
                "model_response",
                serde_json::json!({
                    "stage": stage.as_str(),
                    "agent_id": agent.id.as_str(),
                    "bytes": text.len(),
                    "text": text,
                }),
            )),
            Err(e) => self.conversation_logger.log(ConversationEvent::new(
                "model_error",
                serde_json::json!({
                    "stage": stage.as_str(),
                    "agent_id": agent.id.as_str(),
                    "error": e.to_string(),
                }),
            )),
        }
        reply.map_err(CallFailure::Gateway)
    }

    /// Apply `update` to the traced order and write it through
    pub(super) fn persist(&self, run: &mut Run<'_>, update: OrderUpdate) -> Result<(), Halt> {
        update.clone().apply_to(&mut run.result.order);
        self.orders
            .update_order(&run.result.order.id, update)
            .map(|_| ())
            .map_err(|e| storage_halt(e.to_string()))
    }

    /// Record the halting failure and write the final order state
    pub(super) fn finalize(&self, run: &mut Run<'_>, halt: Halt) {
        let failure = halt.failure().clone();
        let update = match &halt {
            Halt::Reject(f) if f.kind == FailureKind::Cancelled => OrderUpdate::rejected("aborted"),
            Halt::Reject(f) => OrderUpdate::rejected(&f.message),
            Halt::Hold(f) => OrderUpdate {
                error: Some(f.message.clone()),
                ..Default::default()
            },
        };
        run.fail(failure);
        if let Err(Halt::Hold(f) | Halt::Reject(f)) = self.persist(run, update) {
            warn!("Could not record final state of order {}: {}", run.result.order.id, f.message);
        }
    }
}

/// Failure of a single model call
#[derive(Debug)]
enum CallFailure {
    Cancelled,
    Gateway(GatewayError),
}

impl CallFailure {
    fn into_halt(self, role: &str, on_error: fn(PipelineFailure) -> Halt) -> Halt {
        match self {
            CallFailure::Cancelled => cancelled_halt(),
            CallFailure::Gateway(e) => on_error(PipelineFailure::new(
                FailureKind::UpstreamModel,
                format!("{} call failed: {}", role, e),
            )),
        }
    }
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallFailure::Cancelled => write!(f, "cancelled"),
            CallFailure::Gateway(e) => write!(f, "{}", e),
        }
    }
}

fn cancelled_halt() -> Halt {
    Halt::Reject(PipelineFailure::new(
        FailureKind::Cancelled,
        "aborted by operator",
    ))
}

fn storage_halt(message: String) -> Halt {
    Halt::Hold(PipelineFailure::new(FailureKind::Storage, message))
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<(), Halt> {
    if cancellation.is_cancelled() {
        return Err(cancelled_halt());
    }
    Ok(())
}

/// Trace under construction for one pipeline entry point
pub(super) struct Run<'a> {
    pub(super) result: OrderResult,
    pub(super) progress: &'a dyn StageObserver,
}

impl<'a> Run<'a> {
    pub(super) fn new(order: Order, progress: &'a dyn StageObserver) -> Self {
        Self {
            result: OrderResult::new(order),
            progress,
        }
    }

    pub(super) fn start(&self, stage: Stage) -> Instant {
        self.progress.on_stage_start(stage);
        Instant::now()
    }

    pub(super) fn finish(
        &mut self,
        stage: Stage,
        started: Instant,
        outcome: StageOutcome,
        detail: impl Into<String>,
    ) {
        let record = StageRecord::new(stage, outcome, detail).with_elapsed(started.elapsed());
        match outcome {
            StageOutcome::Failed | StageOutcome::Partial => warn!(
                "Order {} stage {}: {} ({})",
                self.result.order.id,
                stage,
                outcome.as_str(),
                record.detail
            ),
            _ => info!(
                "Order {} stage {}: {} ({})",
                self.result.order.id,
                stage,
                outcome.as_str(),
                record.detail
            ),
        }
        self.progress.on_stage_complete(&record);
        self.result.stages.push(record);
    }

    pub(super) fn fail(&mut self, failure: PipelineFailure) {
        warn!("Order {}: {}", self.result.order.id, failure);
        self.result.failures.push(failure);
    }
}
