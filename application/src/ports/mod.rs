//! Ports (interfaces) for external dependencies
//!
//! Ports define the boundaries between the application layer and
//! infrastructure. Adapters in the infrastructure layer implement these.

pub mod conversation_logger;
pub mod hierarchy_repository;
pub mod llm_gateway;
pub mod order_repository;
pub mod progress;
pub mod store_error;
