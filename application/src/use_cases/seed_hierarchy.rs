//! Seed hierarchy use case
//!
//! Loads an initial roster (and optional system config values) into the
//! store. Seeding is idempotent: agents that already exist are skipped, and
//! the whole roster is created through one hierarchy batch so exactly one
//! chain-of-command sync runs at the end.
//!
//! Parsing the seed file is an infrastructure concern; this use case takes
//! already-built [`NewAgent`] values.

use crate::use_cases::hierarchy_service::{
    HierarchyError, HierarchyMutation, HierarchyService, MutationOutcome,
};
use hq_domain::{AgentId, NewAgent, SyncReport, normalize_value};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Author recorded on version 1 of seeded agents
pub const SEED_AUTHOR: &str = "seed";

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid config value in seed: {0}")]
    InvalidConfig(#[from] hq_domain::DomainError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

#[derive(Debug, Clone, Default)]
pub struct SeedInput {
    pub agents: Vec<NewAgent>,
    /// SystemConfig values written before the roster
    pub config: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SeedReport {
    pub created: Vec<AgentId>,
    pub skipped: Vec<AgentId>,
    pub refused: Vec<(AgentId, String)>,
    pub sync: SyncReport,
}

pub struct SeedHierarchyUseCase {
    hierarchy: Arc<HierarchyService>,
}

impl SeedHierarchyUseCase {
    pub fn new(hierarchy: Arc<HierarchyService>) -> Self {
        Self { hierarchy }
    }

    pub fn execute(&self, input: SeedInput) -> Result<SeedReport, SeedError> {
        for (key, value) in &input.config {
            let value = normalize_value(key, value)?;
            self.hierarchy.set_config_value(key, &value)?;
        }

        let mut agents = input.agents;
        // Parents before children
        agents.sort_by_key(|a| a.rank);

        let mut report = SeedReport::default();
        let mut mutations = Vec::with_capacity(agents.len());
        for agent in agents {
            if self.hierarchy.agent(&agent.id)?.is_some() {
                report.skipped.push(agent.id);
                continue;
            }
            mutations.push(HierarchyMutation::CreateAgent {
                agent,
                author: SEED_AUTHOR.to_string(),
            });
        }

        let batch = self.hierarchy.apply_batch(mutations)?;
        for outcome in batch.outcomes {
            match outcome {
                MutationOutcome::Created(agent) => report.created.push(agent.id),
                MutationOutcome::Refused { agent_id, reason } => {
                    warn!("Seed skipped {}: {}", agent_id, reason);
                    report.refused.push((agent_id, reason));
                }
                MutationOutcome::Deactivated(_) => {}
            }
        }
        report.sync = batch.sync;

        info!(
            "Seed complete: {} created, {} skipped, {} refused",
            report.created.len(),
            report.skipped.len(),
            report.refused.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::hierarchy_repository::HierarchyRepository;
    use crate::testing::MemoryStore;
    use hq_domain::{DomainType, Rank, parse_direct_reports_block};

    fn roster() -> Vec<NewAgent> {
        // Deliberately children first
        vec![
            NewAgent::soldier("Momentum Trader", "You are the Momentum Trader.")
                .with_parent("trading_lieutenant")
                .with_domain(DomainType::Trader),
            NewAgent::soldier("Trading Lieutenant", "You are the Trading Lieutenant.")
                .with_id("trading_lieutenant")
                .with_rank(Rank::Lieutenant)
                .with_parent("general")
                .with_domain(DomainType::Command),
            NewAgent::soldier("General", "You are the General.")
                .with_id("general")
                .with_rank(Rank::General)
                .with_domain(DomainType::Command),
        ]
    }

    fn use_case() -> (Arc<MemoryStore>, SeedHierarchyUseCase) {
        let store = Arc::new(MemoryStore::new());
        let hierarchy = Arc::new(HierarchyService::new(store.clone()));
        (store, SeedHierarchyUseCase::new(hierarchy))
    }

    #[test]
    fn test_seed_orders_by_rank_and_syncs() {
        let (store, seed) = use_case();
        let report = seed
            .execute(SeedInput {
                agents: roster(),
                config: vec![("auto_approve".to_string(), "yes".to_string())],
            })
            .unwrap();

        assert_eq!(report.created.len(), 3);
        assert!(report.refused.is_empty());
        assert_eq!(report.sync.agents_examined, 2);
        assert_eq!(report.sync.versions_created, 2);
        assert_eq!(
            store.get_config("auto_approve").unwrap().as_deref(),
            Some("true")
        );

        let general = store.get_agent(&AgentId::new("general")).unwrap().unwrap();
        let ids: Vec<String> = parse_direct_reports_block(&general.current_prompt)
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["trading_lieutenant", "momentum_trader"]);
    }

    #[test]
    fn test_seed_is_idempotent() {
        let (store, seed) = use_case();
        seed.execute(SeedInput {
            agents: roster(),
            config: Vec::new(),
        })
        .unwrap();

        let again = seed
            .execute(SeedInput {
                agents: roster(),
                config: Vec::new(),
            })
            .unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.skipped.len(), 3);
        assert!(again.sync.is_noop());
        assert_eq!(
            store
                .list_prompt_versions(&AgentId::new("general"))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_seed_rejects_bad_config_value() {
        let (_, seed) = use_case();
        let err = seed
            .execute(SeedInput {
                agents: Vec::new(),
                config: vec![("auto_approve".to_string(), "sometimes".to_string())],
            })
            .unwrap_err();
        assert!(matches!(err, SeedError::InvalidConfig(_)));
    }
}
