//! Application-level configuration.
//!
//! - [`PipelineConfig`] — the explicit configuration value threaded through
//!   every command pipeline invocation

pub mod pipeline_config;

pub use pipeline_config::PipelineConfig;
