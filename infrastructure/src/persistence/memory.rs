//! In-memory store

use chrono::Utc;
use hq_application::{HierarchyRepository, NewPromptVersion, OrderRepository, StoreError};
use hq_domain::{Agent, AgentId, NewAgent, Order, OrderId, OrderUpdate, PromptVersion};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    config: BTreeMap<String, String>,
    agents: BTreeMap<AgentId, Agent>,
    versions: BTreeMap<AgentId, Vec<PromptVersion>>,
    /// Insertion order doubles as recency
    orders: Vec<Order>,
}

impl State {
    /// Make `version` the single active version and mirror its text
    fn activate(&mut self, id: &AgentId, version: u32) -> Result<PromptVersion, StoreError> {
        let versions = self
            .versions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let Some(target) = versions.iter().position(|v| v.version == version) else {
            return Err(StoreError::NotFound(format!("{} v{}", id, version)));
        };
        for (i, v) in versions.iter_mut().enumerate() {
            v.active = i == target;
        }
        let active = versions[target].clone();

        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        agent.current_prompt = active.text.clone();
        Ok(active)
    }
}

/// Process-local store; every operation holds one lock for its duration
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl HierarchyRepository for InMemoryStore {
    fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state()?.config.get(key).cloned())
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.state()?
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn list_config(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .state()?
            .config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.state()?.agents.values().cloned().collect())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.state()?.agents.get(id).cloned())
    }

    fn insert_agent(&self, agent: &NewAgent, initial: NewPromptVersion) -> Result<Agent, StoreError> {
        let mut state = self.state()?;
        if state.agents.contains_key(&agent.id) {
            return Err(StoreError::AlreadyExists(agent.id.to_string()));
        }

        let now = Utc::now();
        let mut created = Agent::from_new(agent, now);
        created.current_prompt = initial.text.clone();
        state.versions.insert(
            agent.id.clone(),
            vec![PromptVersion {
                agent_id: agent.id.clone(),
                version: 1,
                text: initial.text,
                notes: initial.notes,
                author: initial.author,
                active: true,
                created_at: now,
                stats: None,
            }],
        );
        state.agents.insert(agent.id.clone(), created.clone());
        Ok(created)
    }

    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        Ok(match state.agents.get_mut(id) {
            Some(agent) => {
                agent.active = active;
                true
            }
            None => false,
        })
    }

    fn update_agent_metadata(
        &self,
        id: &AgentId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let agent = state
            .agents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(name) = name {
            agent.name = name.to_string();
        }
        if let Some(description) = description {
            agent.description = Some(description.to_string());
        }
        Ok(())
    }

    fn append_prompt_version(
        &self,
        id: &AgentId,
        version: NewPromptVersion,
    ) -> Result<PromptVersion, StoreError> {
        let mut state = self.state()?;
        if !state.agents.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let versions = state.versions.entry(id.clone()).or_default();
        let next = versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        versions.push(PromptVersion {
            agent_id: id.clone(),
            version: next,
            text: version.text,
            notes: version.notes,
            author: version.author,
            active: false,
            created_at: Utc::now(),
            stats: None,
        });
        state.activate(id, next)
    }

    fn activate_prompt_version(
        &self,
        id: &AgentId,
        version: u32,
    ) -> Result<PromptVersion, StoreError> {
        self.state()?.activate(id, version)
    }

    fn list_prompt_versions(&self, id: &AgentId) -> Result<Vec<PromptVersion>, StoreError> {
        Ok(self.state()?.versions.get(id).cloned().unwrap_or_default())
    }
}

impl OrderRepository for InMemoryStore {
    fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::AlreadyExists(order.id.to_string()));
        }
        state.orders.push(order.clone());
        Ok(())
    }

    fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, StoreError> {
        let mut state = self.state()?;
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(order);
        Ok(order.clone())
    }

    fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state()?.orders.iter().find(|o| &o.id == id).cloned())
    }

    fn list_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .state()?
            .orders
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hq_domain::{OrderStatus, Rank};
    use std::sync::Arc;
    use std::thread;

    fn store_with_soldier() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_agent(
                &NewAgent::soldier("Momentum Trader", "v1 text"),
                NewPromptVersion::new("v1 text", "Initial version", "seed"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_append_and_rollback_keep_one_active_version() {
        let store = store_with_soldier();
        let id = AgentId::new("momentum_trader");

        let v2 = store
            .append_prompt_version(&id, NewPromptVersion::new("v2 text", "", "test"))
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(store.get_agent(&id).unwrap().unwrap().current_prompt, "v2 text");

        store.activate_prompt_version(&id, 1).unwrap();
        let versions = store.list_prompt_versions(&id).unwrap();
        assert_eq!(versions.iter().filter(|v| v.active).count(), 1);
        assert!(versions[0].active);
        assert_eq!(store.get_agent(&id).unwrap().unwrap().current_prompt, "v1 text");

        // A rollback never reuses numbers
        let v3 = store
            .append_prompt_version(&id, NewPromptVersion::new("v3 text", "", "test"))
            .unwrap();
        assert_eq!(v3.version, 3);
    }

    #[test]
    fn test_concurrent_appends_assign_distinct_versions() {
        let store = Arc::new(store_with_soldier());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..5 {
                        store
                            .append_prompt_version(
                                &AgentId::new("momentum_trader"),
                                NewPromptVersion::new(format!("{}-{}", t, i), "", "test"),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let versions = store
            .list_prompt_versions(&AgentId::new("momentum_trader"))
            .unwrap();
        let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, (1..=21).collect::<Vec<_>>());
        assert_eq!(versions.iter().filter(|v| v.active).count(), 1);
    }

    #[test]
    fn test_duplicate_agent_and_missing_version() {
        let store = store_with_soldier();
        let dup = store.insert_agent(
            &NewAgent::soldier("Momentum Trader", "again").with_rank(Rank::Soldier),
            NewPromptVersion::new("again", "", "test"),
        );
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));

        let missing = store.activate_prompt_version(&AgentId::new("momentum_trader"), 9);
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn test_orders_most_recent_first() {
        let store = InMemoryStore::new();
        let first = Order::new("first");
        let second = Order::new("second");
        store.insert_order(&first).unwrap();
        store.insert_order(&second).unwrap();

        let listed = store.list_orders(10).unwrap();
        assert_eq!(listed[0].command, "second");

        let updated = store
            .update_order(&first.id, OrderUpdate::rejected("no"))
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Rejected);
        assert_eq!(updated.error.as_deref(), Some("no"));
    }
}
