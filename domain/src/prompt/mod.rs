//! Prompt domain
//!
//! Templates for the General, Lieutenant and self-write stages.

mod template;

pub use template::{ANALYST_SECTIONS, PromptTemplate, TRADER_DECISION_SCHEMA};
