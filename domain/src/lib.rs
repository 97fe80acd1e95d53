//! Domain layer for hq
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Chain of command
//!
//! Agents form a three-rank tree: a General, one Lieutenant per division, and
//! Soldiers under each Lieutenant. Every agent owns a versioned prompt
//! document; leader documents carry a DIRECT REPORTS block listing their live
//! children.
//!
//! ## Orders
//!
//! An operator command becomes an [`Order`]. The General's reply is resolved
//! to a Lieutenant ([`resolve_delegation`]), and the Lieutenant's reply is
//! parsed into [`ProposedChange`]s ([`parse_proposals`]).

pub mod config;
pub mod core;
pub mod delegation;
pub mod hierarchy;
pub mod order;
pub mod prompt;
pub mod proposal;

// Re-export commonly used types
pub use config::{AUTO_APPROVE, DEFAULT_MODEL, FALLBACK_MODEL, normalize_value, parse_bool};
pub use crate::core::{
    command::OperatorCommand,
    error::DomainError,
    message::{Message, Role},
    model::Model,
    string::{slugify, strip_code_fences, truncate},
};
pub use delegation::{
    Delegation, DelegationProvenance, Division, DivisionTable, extract_forwarded_order,
    resolve_delegation,
};
pub use hierarchy::{
    Agent, AgentId, DirectReport, DomainType, NewAgent, PerformanceStats, PromptVersion, Rank,
    generate_direct_reports_block, parse_direct_reports_block, replace_direct_reports_block,
};
pub use order::{
    ChangeAction, ChangeDisposition, ChangeOutcome, FailureKind, Order, OrderId, OrderResult,
    OrderStatus, OrderUpdate, PipelineFailure, ProposedChange, Stage, StageOutcome, StageRecord,
    SyncReport,
};
pub use prompt::PromptTemplate;
pub use proposal::{
    AliasTable, ChangeMetadata, ParseStrategy, ProposalParse, extract_metadata, parse_proposals,
};
