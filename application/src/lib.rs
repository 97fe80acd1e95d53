//! Application layer for hq
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    hierarchy_repository::{HierarchyRepository, NewPromptVersion},
    llm_gateway::{GatewayError, LlmGateway, ModelRequest},
    order_repository::OrderRepository,
    progress::{NoProgress, StageObserver},
    store_error::StoreError,
};
pub use use_cases::command_pipeline::{
    ApprovalGate, CommandPipeline, PipelineError, SubmitCommandInput,
};
pub use use_cases::hierarchy_service::{
    BatchReport, HierarchyError, HierarchyMutation, HierarchyService, MutationOutcome,
};
pub use use_cases::seed_hierarchy::{SeedError, SeedHierarchyUseCase, SeedInput, SeedReport};
pub use use_cases::self_write::{SelfWriteOutcome, SelfWriteStage, SelfWriteTask};
