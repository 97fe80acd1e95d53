//! Test doubles shared by the use-case tests

use crate::ports::hierarchy_repository::{HierarchyRepository, NewPromptVersion};
use crate::ports::llm_gateway::{GatewayError, LlmGateway, ModelRequest};
use crate::ports::order_repository::OrderRepository;
use crate::ports::progress::StageObserver;
use crate::ports::store_error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use hq_domain::{
    Agent, AgentId, DomainType, Model, NewAgent, Order, OrderId, OrderUpdate, PromptVersion, Rank,
    Role, Stage, StageRecord,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Gateway ====================

/// A scripted reply for the mock gateway
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Text(String),
    Error(GatewayError),
    /// Reply after a delay (exercises concurrency and cancellation)
    Delayed(Duration, String),
}

/// Mock gateway that answers by matching a needle against the system prompt.
///
/// Each needle owns a queue; the last entry of a queue repeats.
pub(crate) struct ScriptedGateway {
    rules: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<ModelRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn on(self, needle: &str, reply: Scripted) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|(n, _)| n == needle) {
                Some((_, queue)) => queue.push_back(reply),
                None => rules.push((needle.to_string(), VecDeque::from([reply]))),
            }
        }
        self
    }

    pub(crate) fn text(self, needle: &str, reply: &str) -> Self {
        self.on(needle, Scripted::Text(reply.to_string()))
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose system prompt contains `needle`
    pub(crate) fn calls_to(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| system_prompt(r).contains(needle))
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &ModelRequest) -> Option<Scripted> {
        let system = system_prompt(request);
        let mut rules = self.rules.lock().unwrap();
        let (_, queue) = rules.iter_mut().find(|(n, _)| system.contains(n.as_str()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn system_prompt(request: &ModelRequest) -> &str {
    request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(&self, request: &ModelRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match self.next_reply(request) {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(GatewayError::RequestFailed("no script for request".to_string())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ==================== Store ====================

#[derive(Default)]
struct State {
    config: BTreeMap<String, String>,
    agents: BTreeMap<AgentId, Agent>,
    versions: BTreeMap<AgentId, Vec<PromptVersion>>,
    orders: Vec<Order>,
}

/// In-memory store implementing both repositories
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }
}

fn flip_active(state: &mut State, id: &AgentId, version: u32) -> Result<PromptVersion, StoreError> {
    let versions = state
        .versions
        .get_mut(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    if !versions.iter().any(|v| v.version == version) {
        return Err(StoreError::NotFound(format!("{} v{}", id, version)));
    }
    for v in versions.iter_mut() {
        v.active = v.version == version;
    }
    let active = versions
        .iter()
        .find(|v| v.active)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("{} v{}", id, version)))?;
    if let Some(agent) = state.agents.get_mut(id) {
        agent.current_prompt = active.text.clone();
    }
    Ok(active)
}

impl HierarchyRepository for MemoryStore {
    fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().unwrap().config.get(key).cloned())
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn list_config(&self) -> Result<Vec<(String, String)>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.config.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.state.lock().unwrap().agents.values().cloned().collect())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.state.lock().unwrap().agents.get(id).cloned())
    }

    fn insert_agent(&self, agent: &NewAgent, initial: NewPromptVersion) -> Result<Agent, StoreError> {
        let mut state = self.state.lock().unwrap();
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
        let mut state = self.state.lock().unwrap();
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
        let mut state = self.state.lock().unwrap();
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
        let mut state = self.state.lock().unwrap();
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
        flip_active(&mut state, id, next)
    }

    fn activate_prompt_version(&self, id: &AgentId, version: u32) -> Result<PromptVersion, StoreError> {
        let mut state = self.state.lock().unwrap();
        flip_active(&mut state, id, version)
    }

    fn list_prompt_versions(&self, id: &AgentId) -> Result<Vec<PromptVersion>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.versions.get(id).cloned().unwrap_or_default())
    }
}

impl OrderRepository for MemoryStore {
    fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.state.lock().unwrap().orders.push(order.clone());
        Ok(())
    }

    fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, StoreError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(order);
        Ok(order.clone())
    }

    fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().find(|o| &o.id == id).cloned())
    }

    fn list_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().rev().take(limit).cloned().collect())
    }
}

/// The default roster: a General, three Lieutenants and six Soldiers.
///
/// Inserted directly, so no DIRECT REPORTS block exists until a sync runs.
pub(crate) fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for agent in roster() {
        let initial = NewPromptVersion::new(agent.prompt.clone(), "Initial version", "seed");
        store.insert_agent(&agent, initial).unwrap();
    }
    store
}

fn roster() -> Vec<NewAgent> {
    let leader = |id: &str, name: &str, rank: Rank, parent: Option<&str>| {
        let agent = NewAgent::soldier(name, format!("You are the {}.", name))
            .with_id(id)
            .with_rank(rank)
            .with_domain(DomainType::Command);
        match parent {
            Some(p) => agent.with_parent(p),
            None => agent,
        }
    };
    let soldier = |name: &str, parent: &str, domain: DomainType| {
        NewAgent::soldier(name, format!("You are the {}.", name))
            .with_parent(parent)
            .with_domain(domain)
    };

    vec![
        leader("general", "General", Rank::General, None),
        leader("trading_lieutenant", "Trading Lieutenant", Rank::Lieutenant, Some("general")),
        leader("research_lieutenant", "Research Lieutenant", Rank::Lieutenant, Some("general")),
        leader("risk_lieutenant", "Risk Lieutenant", Rank::Lieutenant, Some("general")),
        soldier("Momentum Trader", "trading_lieutenant", DomainType::Trader),
        soldier("Breakout Hunter", "trading_lieutenant", DomainType::Trader),
        soldier("Mean Reversion Trader", "trading_lieutenant", DomainType::Trader)
            .with_model(Model::ClaudeSonnet45),
        soldier("News Analyst", "research_lieutenant", DomainType::Analyst),
        soldier("Macro Analyst", "research_lieutenant", DomainType::Analyst),
        soldier("Drawdown Guard", "risk_lieutenant", DomainType::Risk),
    ]
}

// ==================== Progress ====================

/// Observer that records every callback
#[derive(Default)]
pub(crate) struct TrackingProgress {
    started: Mutex<Vec<Stage>>,
    completed: Mutex<Vec<StageRecord>>,
    self_writes: Mutex<Vec<(AgentId, bool)>>,
}

impl TrackingProgress {
    pub(crate) fn started(&self) -> Vec<Stage> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn completed(&self) -> Vec<StageRecord> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn self_writes(&self) -> Vec<(AgentId, bool)> {
        self.self_writes.lock().unwrap().clone()
    }
}

impl StageObserver for TrackingProgress {
    fn on_stage_start(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn on_stage_complete(&self, record: &StageRecord) {
        self.completed.lock().unwrap().push(record.clone());
    }

    fn on_self_write_complete(&self, agent_id: &AgentId, success: bool) {
        self.self_writes
            .lock()
            .unwrap()
            .push((agent_id.clone(), success));
    }
}
