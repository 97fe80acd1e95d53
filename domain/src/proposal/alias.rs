//! Free-text agent name → canonical id lookup

use crate::hierarchy::entities::Agent;
use crate::hierarchy::value_objects::AgentId;
use std::collections::BTreeMap;

/// Built-in aliases for the default roster
const BUILTIN_V1: &[(&str, &str)] = &[
    ("general", "general"),
    ("commander", "general"),
    ("commanding general", "general"),
    ("trading lieutenant", "trading_lieutenant"),
    ("trading lt", "trading_lieutenant"),
    ("head of trading", "trading_lieutenant"),
    ("research lieutenant", "research_lieutenant"),
    ("research lt", "research_lieutenant"),
    ("intelligence lieutenant", "research_lieutenant"),
    ("risk lieutenant", "risk_lieutenant"),
    ("risk lt", "risk_lieutenant"),
    ("head of risk", "risk_lieutenant"),
    ("momentum", "momentum_trader"),
    ("momentum trader", "momentum_trader"),
    ("breakout", "breakout_hunter"),
    ("breakout hunter", "breakout_hunter"),
    ("breakout trader", "breakout_hunter"),
    ("mean reversion", "mean_reversion_trader"),
    ("mean reversion trader", "mean_reversion_trader"),
    ("reversion trader", "mean_reversion_trader"),
    ("news", "news_analyst"),
    ("news analyst", "news_analyst"),
    ("sentiment", "sentiment_analyst"),
    ("sentiment analyst", "sentiment_analyst"),
    ("macro", "macro_analyst"),
    ("macro analyst", "macro_analyst"),
    ("macro strategist", "macro_analyst"),
    ("drawdown", "drawdown_guard"),
    ("drawdown guard", "drawdown_guard"),
    ("exposure", "exposure_monitor"),
    ("exposure monitor", "exposure_monitor"),
];

/// Versioned lookup table mapping normalized names to agent ids.
///
/// Keys are case-, space- and separator-insensitive: `"Momentum-Trader"`,
/// `"momentum_trader"` and `"the momentum trader agent"` all normalize to
/// `momentum trader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    version: u32,
    entries: BTreeMap<String, AgentId>,
}

impl AliasTable {
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            entries: BTreeMap::new(),
        }
    }

    /// The built-in table (version 1)
    pub fn builtin() -> Self {
        let mut table = Self::empty(1);
        for (alias, id) in BUILTIN_V1 {
            table.insert(alias, AgentId::new(*id));
        }
        table
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, alias: &str, id: AgentId) {
        let key = normalize(alias);
        if !key.is_empty() {
            self.entries.insert(key, id);
        }
    }

    /// Add every agent's display name and id as aliases of itself.
    ///
    /// Store names win over built-in entries with the same key.
    pub fn extend_with_agents<'a>(mut self, agents: impl IntoIterator<Item = &'a Agent>) -> Self {
        for agent in agents {
            self.insert(&agent.name, agent.id.clone());
            self.insert(agent.id.as_str(), agent.id.clone());
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&AgentId> {
        self.entries.get(&normalize(name))
    }

    /// Resolve a free-text name to an id, slugifying unknown names
    pub fn resolve(&self, name: &str) -> AgentId {
        self.lookup(name)
            .cloned()
            .unwrap_or_else(|| AgentId::from_name(name))
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    if words.first() == Some(&"the") {
        words.remove(0);
    }
    if words.len() > 1 && matches!(words.last(), Some(&"agent") | Some(&"soldier")) {
        words.pop();
    }
    words.join(" ")
}
