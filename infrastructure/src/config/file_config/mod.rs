//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into [`PipelineConfig`] at
//! the composition root.

mod divisions;
mod models;
mod output;
mod pipeline;
mod storage;

pub use divisions::FileDivisionsConfig;
pub use models::FileModelsConfig;
pub use output::{FileOutputConfig, FileOutputFormat};
pub use pipeline::FilePipelineConfig;
pub use storage::{FileLoggingConfig, FileProviderConfig, FileStorageConfig, StorageBackend};

use hq_application::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("pipeline.timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("pipeline.self_write_concurrency cannot be 0")]
    InvalidConcurrency,

    #[error("pipeline.temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("{field}: model name cannot be empty")]
    EmptyModelName { field: String },

    #[error("{field}: lieutenant id cannot be empty")]
    EmptyLieutenantId { field: String },
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Default and fallback models
    pub models: FileModelsConfig,
    /// Command pipeline settings
    pub pipeline: FilePipelineConfig,
    /// Persistence backend
    pub storage: FileStorageConfig,
    /// Division → Lieutenant routing
    pub divisions: FileDivisionsConfig,
    /// Conversation transcript
    pub logging: FileLoggingConfig,
    /// OpenAI-compatible endpoint
    pub provider: FileProviderConfig,
    /// Output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.models.validate()?;
        self.pipeline.validate()?;
        self.divisions.validate()?;
        Ok(())
    }

    /// Validate and convert into the value threaded through the pipeline
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigValidationError> {
        self.validate()?;

        let mut config = PipelineConfig::default()
            .with_auto_approve(self.pipeline.auto_approve)
            .with_self_write_concurrency(self.pipeline.self_write_concurrency)
            .with_call_timeout(Duration::from_secs(self.pipeline.timeout_seconds))
            .with_limits(self.pipeline.max_tokens, self.pipeline.temperature)
            .with_divisions(self.divisions.to_table())
            .with_general_id(self.pipeline.general_id.as_str());
        if let Some(model) = self.models.parse_default() {
            config = config.with_default_model(model);
        }
        if let Some(model) = self.models.parse_fallback() {
            config = config.with_fallback_model(model);
        }
        Ok(config)
    }
}
