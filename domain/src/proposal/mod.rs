//! Proposal parsing: Lieutenant reply → [`ProposedChange`] list.
//!
//! Five pure strategies are tried in fixed priority; the first one that
//! yields at least one valid change wins.
//!
//! | # | Strategy | Shape |
//! |---|----------|-------|
//! | 1 | [`ParseStrategy::AdminBlock`] | `CREATE AGENT` / `DELETE AGENT` header with `KEY: value` fields |
//! | 2 | [`ParseStrategy::WrappedJson`] | whole reply is `{"changes": [...]}` |
//! | 3 | [`ParseStrategy::TextBlocks`] | `AGENT:` sections with `NEW PROMPT:` / `GUIDANCE:` |
//! | 4 | [`ParseStrategy::LooseJson`] | standalone `{...}` objects with a replacement key |
//! | 5 | [`ParseStrategy::UnwrappedJson`] | object, bare array, or any array field |
//!
//! An empty result is a normal outcome (soft parse exhaustion).

pub mod admin;
pub mod alias;
pub mod json;
pub mod metadata;
pub mod text_blocks;

pub use alias::AliasTable;
pub use metadata::{ChangeMetadata, extract_metadata};

use crate::order::change::ProposedChange;
use serde::{Deserialize, Serialize};

/// Signature shared by every strategy
pub type StrategyFn = fn(&str, &AliasTable) -> Option<Vec<ProposedChange>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    AdminBlock,
    WrappedJson,
    TextBlocks,
    LooseJson,
    UnwrappedJson,
}

impl ParseStrategy {
    /// Priority order
    pub const CHAIN: [ParseStrategy; 5] = [
        ParseStrategy::AdminBlock,
        ParseStrategy::WrappedJson,
        ParseStrategy::TextBlocks,
        ParseStrategy::LooseJson,
        ParseStrategy::UnwrappedJson,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ParseStrategy::AdminBlock => "admin_block",
            ParseStrategy::WrappedJson => "wrapped_json",
            ParseStrategy::TextBlocks => "text_blocks",
            ParseStrategy::LooseJson => "loose_json",
            ParseStrategy::UnwrappedJson => "unwrapped_json",
        }
    }

    pub fn parser(&self) -> StrategyFn {
        match self {
            ParseStrategy::AdminBlock => admin::parse_admin_block,
            ParseStrategy::WrappedJson => json::parse_wrapped_json,
            ParseStrategy::TextBlocks => text_blocks::parse_text_blocks,
            ParseStrategy::LooseJson => json::parse_loose_objects,
            ParseStrategy::UnwrappedJson => json::parse_unwrapped_json,
        }
    }
}

impl std::fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of running the strategy chain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProposalParse {
    /// `None` when every strategy came up empty
    pub strategy: Option<ParseStrategy>,
    pub changes: Vec<ProposedChange>,
    /// Items the winning strategy produced that failed validation
    pub discarded: usize,
}

impl ProposalParse {
    pub fn is_exhausted(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Run the strategy chain over a Lieutenant reply
pub fn parse_proposals(reply: &str, aliases: &AliasTable) -> ProposalParse {
    for strategy in ParseStrategy::CHAIN {
        let Some(candidates) = (strategy.parser())(reply, aliases) else {
            continue;
        };
        let total = candidates.len();
        let changes: Vec<ProposedChange> =
            candidates.into_iter().filter(ProposedChange::is_valid).collect();
        if !changes.is_empty() {
            return ProposalParse {
                strategy: Some(strategy),
                discarded: total - changes.len(),
                changes,
            };
        }
    }
    ProposalParse::default()
}
