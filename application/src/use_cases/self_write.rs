//! Self-write stage
//!
//! A soldier that received guidance instead of replacement text rewrites its
//! own document. Calls run in parallel under a semaphore; one failed call
//! never affects the others.

use crate::ports::llm_gateway::{LlmGateway, ModelRequest};
use crate::ports::progress::StageObserver;
use hq_domain::{Agent, AgentId, Model, PromptTemplate, strip_code_fences};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One self-write request; `index` points back into the caller's change list
#[derive(Debug, Clone)]
pub struct SelfWriteTask {
    pub index: usize,
    pub agent: Agent,
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelfWriteOutcome {
    Written {
        index: usize,
        agent_id: AgentId,
        text: String,
    },
    Failed {
        index: usize,
        agent_id: AgentId,
        error: String,
    },
    Cancelled {
        index: usize,
        agent_id: AgentId,
    },
}

impl SelfWriteOutcome {
    pub fn index(&self) -> usize {
        match self {
            SelfWriteOutcome::Written { index, .. }
            | SelfWriteOutcome::Failed { index, .. }
            | SelfWriteOutcome::Cancelled { index, .. } => *index,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, SelfWriteOutcome::Written { .. })
    }
}

pub struct SelfWriteStage<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    concurrency: usize,
    default_model: Model,
    max_tokens: u32,
    temperature: f32,
}

impl<G: LlmGateway + 'static> SelfWriteStage<G> {
    pub fn new(gateway: Arc<G>, concurrency: usize, default_model: Model) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
            default_model,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Run all tasks with at most `concurrency` calls in flight.
    ///
    /// Returns one outcome per task, ordered by `index`. On cancellation the
    /// remaining calls are aborted and reported as cancelled.
    pub async fn run(
        &self,
        tasks: Vec<SelfWriteTask>,
        progress: &dyn StageObserver,
        cancellation: &CancellationToken,
    ) -> Vec<SelfWriteOutcome> {
        if tasks.is_empty() {
            return Vec::new();
        }
        info!(
            "Self-write: {} agents, concurrency {}",
            tasks.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let pending: Vec<(usize, AgentId)> = tasks
            .iter()
            .map(|t| (t.index, t.agent.id.clone()))
            .collect();
        let mut join_set = JoinSet::new();

        for task in tasks {
            let gateway = Arc::clone(&self.gateway);
            let semaphore = Arc::clone(&semaphore);
            let request = self.request_for(&task);

            join_set.spawn(async move {
                let SelfWriteTask { index, agent, .. } = task;
                let agent_id = agent.id;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return SelfWriteOutcome::Cancelled { index, agent_id };
                };

                match gateway.complete(&request).await {
                    Ok(reply) => {
                        let text = strip_code_fences(&reply);
                        if text.trim().is_empty() {
                            SelfWriteOutcome::Failed {
                                index,
                                agent_id,
                                error: "model returned an empty document".to_string(),
                            }
                        } else {
                            SelfWriteOutcome::Written {
                                index,
                                agent_id,
                                text,
                            }
                        }
                    }
                    Err(e) => SelfWriteOutcome::Failed {
                        index,
                        agent_id,
                        error: e.to_string(),
                    },
                }
            });
        }

        let mut outcomes: Vec<SelfWriteOutcome> = Vec::with_capacity(pending.len());
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    join_set.abort_all();
                    break;
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok(outcome) => {
                    match &outcome {
                        SelfWriteOutcome::Written { agent_id, .. } => {
                            debug!("Self-write for {} succeeded", agent_id);
                            progress.on_self_write_complete(agent_id, true);
                        }
                        SelfWriteOutcome::Failed { agent_id, error, .. } => {
                            warn!("Self-write for {} failed: {}", agent_id, error);
                            progress.on_self_write_complete(agent_id, false);
                        }
                        SelfWriteOutcome::Cancelled { .. } => {}
                    }
                    outcomes.push(outcome);
                }
                Err(e) => warn!("Self-write task join error: {}", e),
            }
        }

        // Tasks that never reported (aborted or panicked)
        for (index, agent_id) in pending {
            if outcomes.iter().all(|o| o.index() != index) {
                outcomes.push(if cancellation.is_cancelled() {
                    SelfWriteOutcome::Cancelled { index, agent_id }
                } else {
                    SelfWriteOutcome::Failed {
                        index,
                        agent_id,
                        error: "self-write task did not complete".to_string(),
                    }
                });
            }
        }

        outcomes.sort_by_key(SelfWriteOutcome::index);
        outcomes
    }

    fn request_for(&self, task: &SelfWriteTask) -> ModelRequest {
        ModelRequest::new(task.agent.model_or(&self.default_model))
            .system(PromptTemplate::self_write_system(&task.agent))
            .user(PromptTemplate::self_write(
                &task.agent.current_prompt,
                &task.guidance,
            ))
            .with_limits(self.max_tokens, self.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm_gateway::GatewayError;
    use crate::ports::progress::NoProgress;
    use crate::testing::{Scripted, ScriptedGateway, TrackingProgress, seeded_store};
    use crate::ports::hierarchy_repository::HierarchyRepository;
    use std::time::Duration;

    fn task(index: usize, id: &str, guidance: &str) -> SelfWriteTask {
        let agent = seeded_store()
            .get_agent(&AgentId::new(id))
            .unwrap()
            .unwrap();
        SelfWriteTask {
            index,
            agent,
            guidance: guidance.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let gateway = ScriptedGateway::new()
            .text("You are Momentum Trader, rewriting", "```\nMomentum v2\n```")
            .text("You are Breakout Hunter, rewriting", "   ")
            .on(
                "You are News Analyst, rewriting",
                Scripted::Error(GatewayError::ConnectionError("reset".into())),
            )
            .text("You are Macro Analyst, rewriting", "Macro v2");
        let stage = SelfWriteStage::new(Arc::new(gateway), 2, Model::Gpt5);
        let progress = TrackingProgress::default();

        let outcomes = stage
            .run(
                vec![
                    task(0, "momentum_trader", "be bolder"),
                    task(1, "breakout_hunter", "wait for volume"),
                    task(2, "news_analyst", "watch CPI"),
                    task(3, "macro_analyst", "watch rates"),
                ],
                &progress,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[0],
            SelfWriteOutcome::Written {
                index: 0,
                agent_id: AgentId::new("momentum_trader"),
                text: "Momentum v2".to_string(),
            }
        );
        assert!(matches!(outcomes[1], SelfWriteOutcome::Failed { .. }));
        assert!(matches!(outcomes[2], SelfWriteOutcome::Failed { .. }));
        assert!(outcomes[3].is_written());
        assert_eq!(progress.self_writes().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut gateway = ScriptedGateway::new();
        for name in ["Momentum Trader", "Breakout Hunter", "Mean Reversion Trader", "News Analyst", "Macro Analyst"] {
            gateway = gateway.on(
                &format!("You are {}, rewriting", name),
                Scripted::Delayed(Duration::from_millis(30), format!("{} v2", name)),
            );
        }
        let gateway = Arc::new(gateway);
        let stage = SelfWriteStage::new(Arc::clone(&gateway), 2, Model::Gpt5);

        let outcomes = stage
            .run(
                vec![
                    task(0, "momentum_trader", "a"),
                    task(1, "breakout_hunter", "b"),
                    task(2, "mean_reversion_trader", "c"),
                    task(3, "news_analyst", "d"),
                    task(4, "macro_analyst", "e"),
                ],
                &NoProgress,
                &CancellationToken::new(),
            )
            .await;

        assert!(outcomes.iter().all(SelfWriteOutcome::is_written));
        assert!(gateway.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_agent_model_and_guidance_are_used() {
        let gateway = Arc::new(
            ScriptedGateway::new().text("You are Mean Reversion Trader, rewriting", "new doc"),
        );
        let stage = SelfWriteStage::new(Arc::clone(&gateway), 4, Model::Gpt5);

        stage
            .run(
                vec![task(7, "mean_reversion_trader", "fade the open")],
                &NoProgress,
                &CancellationToken::new(),
            )
            .await;

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, Model::ClaudeSonnet45);
        assert!(requests[0].last_user_message().unwrap().contains("fade the open"));
    }

    #[tokio::test]
    async fn test_cancellation_reports_remaining_as_cancelled() {
        let gateway = ScriptedGateway::new().on(
            "You are Momentum Trader, rewriting",
            Scripted::Delayed(Duration::from_secs(30), "late".into()),
        );
        let stage = SelfWriteStage::new(Arc::new(gateway), 1, Model::Gpt5);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcomes = stage
            .run(
                vec![task(0, "momentum_trader", "x")],
                &NoProgress,
                &token,
            )
            .await;

        assert_eq!(
            outcomes,
            vec![SelfWriteOutcome::Cancelled {
                index: 0,
                agent_id: AgentId::new("momentum_trader"),
            }]
        );
    }
}
