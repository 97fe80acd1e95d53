//! Agent hierarchy domain
//!
//! Agents form a three-rank tree (General → Lieutenants → Soldiers). Each
//! agent owns an append-only history of [`PromptVersion`]s, and every leader's
//! document carries a synchronized DIRECT REPORTS block enumerating its live
//! children (see [`chain_of_command`]).

pub mod chain_of_command;
pub mod entities;
pub mod value_objects;

pub use chain_of_command::{
    BLOCK_BEGIN, BLOCK_END, DirectReport, generate_direct_reports_block,
    parse_direct_reports_block, replace_direct_reports_block,
};
pub use entities::{Agent, DomainType, NewAgent, PerformanceStats, PromptVersion, Rank};
pub use value_objects::AgentId;
