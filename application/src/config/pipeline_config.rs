//! Pipeline configuration — command pipeline control.
//!
//! [`PipelineConfig`] replaces ambient process-wide settings: the pipeline
//! never reads globals, so tests can vary any field per invocation.
//!
//! Persisted `SystemConfig` values (`auto_approve`, `default_model`) take
//! precedence over the corresponding fields here when present.

use hq_domain::{AgentId, DivisionTable, Model};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Commit parsed changes immediately
    pub auto_approve: bool,
    /// Model for agents without an assigned model
    pub default_model: Model,
    /// Model retried once when a primary call fails
    pub fallback_model: Model,
    /// Upper bound on parallel self-write calls
    pub self_write_concurrency: usize,
    /// Deadline for a single model call
    pub call_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Division → Lieutenant routing
    pub divisions: DivisionTable,
    /// Id of the General that receives operator commands
    pub general_id: AgentId,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            default_model: Model::default(),
            fallback_model: Model::fallback(),
            self_write_concurrency: 4,
            call_timeout: Duration::from_secs(120),
            max_tokens: 4096,
            temperature: 0.7,
            divisions: DivisionTable::default(),
            general_id: AgentId::new("general"),
        }
    }
}

impl PipelineConfig {
    // ==================== Builder Methods ====================

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn with_default_model(mut self, model: Model) -> Self {
        self.default_model = model;
        self
    }

    pub fn with_fallback_model(mut self, model: Model) -> Self {
        self.fallback_model = model;
        self
    }

    /// Values below 1 are clamped to 1
    pub fn with_self_write_concurrency(mut self, limit: usize) -> Self {
        self.self_write_concurrency = limit.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_divisions(mut self, divisions: DivisionTable) -> Self {
        self.divisions = divisions;
        self
    }

    pub fn with_general_id(mut self, id: impl Into<AgentId>) -> Self {
        self.general_id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(!config.auto_approve);
        assert_eq!(config.self_write_concurrency, 4);
        assert_eq!(config.call_timeout, Duration::from_secs(120));
        assert_eq!(config.fallback_model, Model::Gpt5Mini);
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let config = PipelineConfig::default().with_self_write_concurrency(0);
        assert_eq!(config.self_write_concurrency, 1);
    }
}
