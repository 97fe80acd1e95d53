//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`] — model identifiers assigned to agents
//! - [`command::OperatorCommand`] — a validated free-text command
//! - [`message::Message`] — a single chat message sent to a model
//! - [`error::DomainError`] — domain-level errors

pub mod command;
pub mod error;
pub mod message;
pub mod model;
pub mod string;
