//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod command_pipeline;
pub mod hierarchy_service;
pub mod seed_hierarchy;
pub mod self_write;
