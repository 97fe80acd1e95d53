//! Infrastructure layer for hq
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: persistence, model callers, the transcript
//! logger, plus configuration and seed file loading.

pub mod config;
pub mod logging;
pub mod persistence;
pub mod providers;
pub mod seed;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileOutputFormat, StorageBackend,
};
pub use logging::JsonlConversationLogger;
pub use persistence::{InMemoryStore, SqliteStore};
pub use providers::{FallbackGateway, OpenAiCompatibleGateway};
pub use seed::{SeedFile, SeedFileError};
