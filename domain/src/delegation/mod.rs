//! Delegation domain
//!
//! Decides which Lieutenant owns an order, given the General's free-text
//! reply. Resolution is total: when nothing matches, a fixed default
//! division is used and reported as [`DelegationProvenance::Defaulted`].

pub mod division;
pub mod resolver;

pub use division::{Division, DivisionTable};
pub use resolver::{Delegation, DelegationProvenance, extract_forwarded_order, resolve_delegation};
