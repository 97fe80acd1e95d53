//! Configuration file loading for hq
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `HQ_` environment variables (`HQ_PIPELINE__AUTO_APPROVE=true`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./hq.toml` or `./.hq.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/hq/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileDivisionsConfig, FileLoggingConfig, FileModelsConfig,
    FileOutputConfig, FileOutputFormat, FilePipelineConfig, FileProviderConfig,
    FileStorageConfig, StorageBackend,
};
pub use loader::ConfigLoader;
