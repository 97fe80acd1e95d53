//! Divisions and their keyword sets

use crate::hierarchy::value_objects::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A second-tier command division, each led by one Lieutenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Division {
    Trading,
    Research,
    Risk,
}

impl Division {
    /// Fixed resolution order, used by both marker and inference passes
    pub const ALL: [Division; 3] = [Division::Trading, Division::Research, Division::Risk];

    /// Used when neither a marker nor inference matches
    pub const DEFAULT: Division = Division::Trading;

    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Trading => "trading",
            Division::Research => "research",
            Division::Risk => "risk",
        }
    }

    /// Tokens accepted on an explicit `DELEGATE TO:` marker line (uppercase)
    pub fn marker_keywords(&self) -> &'static [&'static str] {
        match self {
            Division::Trading => &["TRADING", "TRADE", "TRADER", "TRADERS", "EXECUTION"],
            Division::Research => &["RESEARCH", "INTELLIGENCE", "ANALYSIS", "ANALYST", "ANALYSTS"],
            Division::Risk => &["RISK", "COMPLIANCE"],
        }
    }

    /// Words and phrases that imply the division when scanning the full reply
    pub fn inference_keywords(&self) -> &'static [&'static str] {
        match self {
            Division::Trading => &[
                "trading",
                "trade",
                "trades",
                "position",
                "positions",
                "position sizing",
                "sizing",
                "entry",
                "entries",
                "exit",
                "exits",
                "momentum",
                "breakout",
                "mean reversion",
                "leverage",
            ],
            Division::Research => &[
                "research",
                "news",
                "sentiment",
                "macro",
                "fundamentals",
                "analysis",
                "analyst",
                "earnings",
                "intelligence",
                "signals",
            ],
            Division::Risk => &[
                "risk",
                "drawdown",
                "stop loss",
                "stop-loss",
                "stops",
                "exposure",
                "hedge",
                "hedging",
                "volatility",
                "compliance",
            ],
        }
    }

    /// Id of the Lieutenant that leads this division in the default roster
    pub fn default_lieutenant(&self) -> AgentId {
        AgentId::new(format!("{}_lieutenant", self.as_str()))
    }
}

impl std::fmt::Display for Division {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Division {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trading" => Ok(Division::Trading),
            "research" => Ok(Division::Research),
            "risk" => Ok(Division::Risk),
            other => Err(format!("unknown division: {}", other)),
        }
    }
}

/// Maps each division to the Lieutenant that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionTable {
    lieutenants: HashMap<Division, AgentId>,
}

impl DivisionTable {
    pub fn new() -> Self {
        let lieutenants = Division::ALL
            .iter()
            .map(|d| (*d, d.default_lieutenant()))
            .collect();
        Self { lieutenants }
    }

    /// Route a division to a different Lieutenant id
    pub fn with_lieutenant(mut self, division: Division, lieutenant: impl Into<AgentId>) -> Self {
        self.lieutenants.insert(division, lieutenant.into());
        self
    }

    pub fn lieutenant_for(&self, division: Division) -> AgentId {
        self.lieutenants
            .get(&division)
            .cloned()
            .unwrap_or_else(|| division.default_lieutenant())
    }
}

impl Default for DivisionTable {
    fn default() -> Self {
        Self::new()
    }
}
