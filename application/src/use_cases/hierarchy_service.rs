//! Hierarchy service
//!
//! Versioning and chain-of-command sync over a [`HierarchyRepository`].
//!
//! Structural mutations go through [`HierarchyService::apply`] /
//! [`HierarchyService::apply_batch`] only; both run
//! [`sync_chain_of_command`](HierarchyService::sync_chain_of_command) inside
//! the same critical section, so leader documents never enumerate a stale
//! roster after a mutation returns.

use crate::ports::hierarchy_repository::{HierarchyRepository, NewPromptVersion};
use crate::ports::store_error::StoreError;
use hq_domain::{
    Agent, AgentId, NewAgent, PromptVersion, Rank, SyncReport, generate_direct_reports_block,
    replace_direct_reports_block,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Author recorded on versions created by the chain-of-command sync
pub const SYNC_AUTHOR: &str = "system:chain-of-command";

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A structural change to the roster
#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyMutation {
    /// Create an agent; `author` is recorded on its first version
    CreateAgent { agent: NewAgent, author: String },
    DeactivateAgent(AgentId),
}

/// Result of one mutation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Created(Agent),
    Deactivated(AgentId),
    /// Not applied; state untouched
    Refused { agent_id: AgentId, reason: String },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, MutationOutcome::Refused { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// One entry per mutation, in input order
    pub outcomes: Vec<MutationOutcome>,
    pub sync: SyncReport,
}

pub struct HierarchyService {
    repository: Arc<dyn HierarchyRepository>,
    /// Serializes structural mutations, version writes and sync passes
    structure: Mutex<()>,
}

impl HierarchyService {
    pub fn new(repository: Arc<dyn HierarchyRepository>) -> Self {
        Self {
            repository,
            structure: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn HierarchyRepository> {
        &self.repository
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.structure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Queries ====================

    pub fn agents(&self) -> Result<Vec<Agent>, HierarchyError> {
        Ok(self.repository.list_agents()?)
    }

    pub fn agent(&self, id: &AgentId) -> Result<Option<Agent>, HierarchyError> {
        Ok(self.repository.get_agent(id)?)
    }

    pub fn prompt_versions(&self, id: &AgentId) -> Result<Vec<PromptVersion>, HierarchyError> {
        Ok(self.repository.list_prompt_versions(id)?)
    }

    pub fn config_value(&self, key: &str) -> Result<Option<String>, HierarchyError> {
        Ok(self.repository.get_config(key)?)
    }

    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), HierarchyError> {
        Ok(self.repository.set_config(key, value)?)
    }

    pub fn config_values(&self) -> Result<Vec<(String, String)>, HierarchyError> {
        Ok(self.repository.list_config()?)
    }

    /// Active soldiers reporting to `lieutenant`, sorted by name
    pub fn soldiers_of(&self, lieutenant: &AgentId) -> Result<Vec<Agent>, HierarchyError> {
        let mut soldiers: Vec<Agent> = self
            .repository
            .list_agents()?
            .into_iter()
            .filter(|a| a.active && a.rank == Rank::Soldier)
            .filter(|a| a.parent_id.as_ref() == Some(lieutenant))
            .collect();
        soldiers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(soldiers)
    }

    /// The DIRECT REPORTS block for `id` as it would be rendered right now
    pub fn generate_direct_reports_block(
        &self,
        id: &AgentId,
    ) -> Result<Option<String>, HierarchyError> {
        let roster = self.repository.list_agents()?;
        let agent = roster
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| HierarchyError::AgentNotFound(id.clone()))?;
        Ok(generate_direct_reports_block(agent, &roster))
    }

    // ==================== Versions ====================

    pub fn create_prompt_version(
        &self,
        id: &AgentId,
        text: &str,
        notes: &str,
        author: &str,
    ) -> Result<PromptVersion, HierarchyError> {
        let _guard = self.lock();
        self.append(id, NewPromptVersion::new(text, notes, author))
    }

    /// Manual rollback to an earlier version
    pub fn activate_prompt_version(
        &self,
        id: &AgentId,
        version: u32,
    ) -> Result<PromptVersion, HierarchyError> {
        let _guard = self.lock();
        let activated = self
            .repository
            .activate_prompt_version(id, version)
            .map_err(|e| not_found_as_agent(e, id))?;
        info!("Activated version {} of {}", version, id);
        Ok(activated)
    }

    pub fn update_metadata(
        &self,
        id: &AgentId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), HierarchyError> {
        if name.is_none() && description.is_none() {
            return Ok(());
        }
        let _guard = self.lock();
        self.repository
            .update_agent_metadata(id, name, description)
            .map_err(|e| not_found_as_agent(e, id))
    }

    fn append(
        &self,
        id: &AgentId,
        version: NewPromptVersion,
    ) -> Result<PromptVersion, HierarchyError> {
        let created = self
            .repository
            .append_prompt_version(id, version)
            .map_err(|e| not_found_as_agent(e, id))?;
        debug!("Created version {} of {}", created.version, id);
        Ok(created)
    }

    // ==================== Chain of command ====================

    /// Recompute every active leader's DIRECT REPORTS block and append a
    /// version only where the text changed. Idempotent.
    pub fn sync_chain_of_command(&self) -> Result<SyncReport, HierarchyError> {
        let _guard = self.lock();
        self.sync_locked()
    }

    fn sync_locked(&self) -> Result<SyncReport, HierarchyError> {
        let roster = self.repository.list_agents()?;
        let mut report = SyncReport::default();

        let mut leaders: Vec<&Agent> = roster.iter().filter(|a| a.active && a.is_leader()).collect();
        leaders.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));

        for leader in leaders {
            let Some(block) = generate_direct_reports_block(leader, &roster) else {
                continue;
            };
            report.agents_examined += 1;

            let updated = replace_direct_reports_block(&leader.current_prompt, &block);
            if updated == leader.current_prompt {
                continue;
            }
            self.append(
                &leader.id,
                NewPromptVersion::new(updated, "Chain-of-command sync", SYNC_AUTHOR),
            )?;
            report.versions_created += 1;
        }

        if report.versions_created > 0 {
            info!(
                "Chain-of-command sync updated {} of {} leaders",
                report.versions_created, report.agents_examined
            );
        }
        Ok(report)
    }

    // ==================== Structural mutation ====================

    /// Apply one mutation followed by a sync.
    ///
    /// Returns `Ok(false)` when the mutation was refused (e.g. deactivating a
    /// general or lieutenant); state is left untouched in that case.
    pub fn apply(&self, mutation: HierarchyMutation) -> Result<bool, HierarchyError> {
        let report = self.apply_batch(vec![mutation])?;
        Ok(report.outcomes.iter().all(MutationOutcome::is_applied))
    }

    /// Apply mutations in order, then run exactly one sync.
    ///
    /// Refusals are reported per mutation; only storage failures abort the
    /// batch. An empty batch still syncs.
    pub fn apply_batch(
        &self,
        mutations: Vec<HierarchyMutation>,
    ) -> Result<BatchReport, HierarchyError> {
        let _guard = self.lock();

        let mut outcomes = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let outcome = match mutation {
                HierarchyMutation::CreateAgent { agent, author } => self.create_locked(agent, &author)?,
                HierarchyMutation::DeactivateAgent(id) => self.deactivate_locked(&id)?,
            };
            outcomes.push(outcome);
        }

        let sync = self.sync_locked()?;
        Ok(BatchReport { outcomes, sync })
    }

    fn create_locked(&self, agent: NewAgent, author: &str) -> Result<MutationOutcome, HierarchyError> {
        let refuse = |reason: String| MutationOutcome::Refused {
            agent_id: agent.id.clone(),
            reason,
        };

        if agent.id.is_empty() {
            return Ok(refuse("agent id is empty".to_string()));
        }
        if self.repository.get_agent(&agent.id)?.is_some() {
            return Ok(refuse(format!("agent {} already exists", agent.id)));
        }
        if let Some(reason) = self.parent_problem(&agent)? {
            return Ok(refuse(reason));
        }

        let initial = NewPromptVersion::new(agent.prompt.clone(), "Initial version", author);
        match self.repository.insert_agent(&agent, initial) {
            Ok(created) => {
                info!("Created {} {} ({})", created.rank, created.id, created.name);
                Ok(MutationOutcome::Created(created))
            }
            Err(StoreError::AlreadyExists(_)) => {
                Ok(refuse(format!("agent {} already exists", agent.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Expected parent rank per rank: none for a general, an active general
    /// for a lieutenant, an active lieutenant for a soldier
    fn parent_problem(&self, agent: &NewAgent) -> Result<Option<String>, HierarchyError> {
        let expected = match agent.rank {
            Rank::General => return Ok(None),
            Rank::Lieutenant => Rank::General,
            Rank::Soldier => Rank::Lieutenant,
        };
        let Some(parent_id) = &agent.parent_id else {
            return Ok(Some(format!("{} {} needs a parent", agent.rank, agent.id)));
        };
        match self.repository.get_agent(parent_id)? {
            Some(parent) if parent.active && parent.rank == expected => Ok(None),
            Some(parent) => Ok(Some(format!(
                "parent {} is not an active {}",
                parent.id, expected
            ))),
            None => Ok(Some(format!("parent {} does not exist", parent_id))),
        }
    }

    fn deactivate_locked(&self, id: &AgentId) -> Result<MutationOutcome, HierarchyError> {
        let refuse = |reason: String| MutationOutcome::Refused {
            agent_id: id.clone(),
            reason,
        };

        let Some(agent) = self.repository.get_agent(id)? else {
            return Ok(refuse(format!("agent {} does not exist", id)));
        };
        if agent.is_leader() {
            warn!("Refusing to deactivate {} {}", agent.rank, id);
            return Ok(refuse(format!("cannot deactivate a {}", agent.rank)));
        }
        if !agent.active {
            return Ok(refuse(format!("agent {} is already inactive", id)));
        }

        self.repository.set_agent_active(id, false)?;
        info!("Deactivated {}", id);
        Ok(MutationOutcome::Deactivated(id.clone()))
    }
}

fn not_found_as_agent(error: StoreError, id: &AgentId) -> HierarchyError {
    match error {
        StoreError::NotFound(_) => HierarchyError::AgentNotFound(id.clone()),
        other => HierarchyError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, seeded_store};
    use hq_domain::hierarchy::BLOCK_BEGIN;
    use hq_domain::{DomainType, parse_direct_reports_block};
    use std::collections::BTreeSet;

    fn service() -> (Arc<MemoryStore>, HierarchyService) {
        let store = seeded_store();
        let service = HierarchyService::new(store.clone());
        (store, service)
    }

    fn versions(service: &HierarchyService, id: &str) -> Vec<PromptVersion> {
        service.prompt_versions(&AgentId::new(id)).unwrap()
    }

    #[test]
    fn test_single_active_version_after_create_and_activate() {
        let (_, service) = service();
        let id = AgentId::new("momentum_trader");

        service.create_prompt_version(&id, "v2", "n", "test").unwrap();
        service.create_prompt_version(&id, "v3", "n", "test").unwrap();
        service.activate_prompt_version(&id, 1).unwrap();
        service.create_prompt_version(&id, "v4", "n", "test").unwrap();
        service.activate_prompt_version(&id, 2).unwrap();

        let all = versions(&service, "momentum_trader");
        assert_eq!(all.iter().filter(|v| v.active).count(), 1);
        assert_eq!(all.iter().find(|v| v.active).unwrap().version, 2);
        assert_eq!(service.agent(&id).unwrap().unwrap().current_prompt, "v2");
        let numbers: Vec<u32> = all.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_activate_missing_version_fails() {
        let (_, service) = service();
        let err = service
            .activate_prompt_version(&AgentId::new("momentum_trader"), 9)
            .unwrap_err();
        assert!(matches!(err, HierarchyError::AgentNotFound(_)));
    }

    #[test]
    fn test_concurrent_commits_get_unique_increasing_versions() {
        let (_, service) = service();
        let service = Arc::new(service);
        let id = AgentId::new("momentum_trader");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let service = Arc::clone(&service);
                let id = id.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        service
                            .create_prompt_version(&id, &format!("t{}-{}", t, i), "", "test")
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = versions(&service, "momentum_trader");
        let numbers: Vec<u32> = all.iter().map(|v| v.version).collect();
        let expected: Vec<u32> = (1..=81).collect();
        assert_eq!(numbers, expected);
        assert_eq!(all.iter().filter(|v| v.active).count(), 1);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let (_, service) = service();
        let first = service.sync_chain_of_command().unwrap();
        assert_eq!(first.agents_examined, 4);
        assert!(first.versions_created > 0);

        let second = service.sync_chain_of_command().unwrap();
        assert_eq!(second.agents_examined, 4);
        assert!(second.is_noop());
    }

    #[test]
    fn test_synced_block_round_trips_active_children() {
        let (_, service) = service();
        service.sync_chain_of_command().unwrap();

        let lieutenant = service
            .agent(&AgentId::new("trading_lieutenant"))
            .unwrap()
            .unwrap();
        assert!(lieutenant.current_prompt.contains(BLOCK_BEGIN));

        let recovered: BTreeSet<AgentId> = parse_direct_reports_block(&lieutenant.current_prompt)
            .into_iter()
            .map(|r| r.id)
            .collect();
        let expected: BTreeSet<AgentId> = service
            .soldiers_of(&lieutenant.id)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_deactivating_leader_is_refused_without_mutation() {
        let (_, service) = service();
        service.sync_chain_of_command().unwrap();
        let before = service.agents().unwrap();

        let applied = service
            .apply(HierarchyMutation::DeactivateAgent(AgentId::new("risk_lieutenant")))
            .unwrap();
        assert!(!applied);
        assert_eq!(service.agents().unwrap(), before);

        let general = service.apply(HierarchyMutation::DeactivateAgent(AgentId::new("general")));
        assert!(!general.unwrap());
    }

    #[test]
    fn test_deactivate_soldier_resyncs_leaders() {
        let (_, service) = service();
        service.sync_chain_of_command().unwrap();

        let applied = service
            .apply(HierarchyMutation::DeactivateAgent(AgentId::new("breakout_hunter")))
            .unwrap();
        assert!(applied);

        let lieutenant = service
            .agent(&AgentId::new("trading_lieutenant"))
            .unwrap()
            .unwrap();
        assert!(!lieutenant.current_prompt.contains("breakout_hunter"));
        let general = service.agent(&AgentId::new("general")).unwrap().unwrap();
        assert!(!general.current_prompt.contains("breakout_hunter"));
    }

    #[test]
    fn test_create_agent_appears_in_blocks() {
        let (_, service) = service();
        let new = NewAgent::soldier("Volatility Surfer", "You are the Volatility Surfer.")
            .with_parent("trading_lieutenant")
            .with_domain(DomainType::Trader);

        let report = service
            .apply_batch(vec![HierarchyMutation::CreateAgent {
                agent: new,
                author: "test".to_string(),
            }])
            .unwrap();
        assert!(matches!(report.outcomes[0], MutationOutcome::Created(_)));
        assert!(report.sync.versions_created >= 2);

        let block = service
            .generate_direct_reports_block(&AgentId::new("trading_lieutenant"))
            .unwrap()
            .unwrap();
        assert!(block.contains("Volatility Surfer [volatility_surfer]"));
        let created = versions(&service, "volatility_surfer");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].author, "test");
    }

    #[test]
    fn test_create_refused_for_duplicate_or_bad_parent() {
        let (_, service) = service();
        let duplicate = NewAgent::soldier("Momentum Trader", "x").with_parent("trading_lieutenant");
        let orphan = NewAgent::soldier("Orphan", "x").with_parent("nobody");
        let wrong_rank = NewAgent::soldier("Nested", "x").with_parent("momentum_trader");

        let report = service
            .apply_batch(vec![
                HierarchyMutation::CreateAgent { agent: duplicate, author: "t".into() },
                HierarchyMutation::CreateAgent { agent: orphan, author: "t".into() },
                HierarchyMutation::CreateAgent { agent: wrong_rank, author: "t".into() },
            ])
            .unwrap();
        assert!(report.outcomes.iter().all(|o| !o.is_applied()));
        assert!(service.agent(&AgentId::new("orphan")).unwrap().is_none());
    }

    #[test]
    fn test_block_for_soldier_is_none() {
        let (_, service) = service();
        assert!(
            service
                .generate_direct_reports_block(&AgentId::new("momentum_trader"))
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            service.generate_direct_reports_block(&AgentId::new("ghost")),
            Err(HierarchyError::AgentNotFound(_))
        ));
    }
}
