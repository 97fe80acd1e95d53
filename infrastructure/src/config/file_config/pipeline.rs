//! Pipeline configuration from TOML (`[pipeline]` section)

use super::ConfigValidationError;
use serde::{Deserialize, Serialize};

/// # Example
///
/// ```toml
/// [pipeline]
/// auto_approve = false
/// self_write_concurrency = 4
/// timeout_seconds = 120
/// max_tokens = 4096
/// temperature = 0.7
/// general_id = "general"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    /// Commit parsed changes without operator approval
    pub auto_approve: bool,
    /// Parallel self-write calls
    pub self_write_concurrency: usize,
    /// Deadline for one model call
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Agent that receives operator commands
    pub general_id: String,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            self_write_concurrency: 4,
            timeout_seconds: 120,
            max_tokens: 4096,
            temperature: 0.7,
            general_id: "general".to_string(),
        }
    }
}

impl FilePipelineConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.self_write_concurrency == 0 {
            return Err(ConfigValidationError::InvalidConcurrency);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigValidationError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: FilePipelineConfig = toml::from_str("auto_approve = true").unwrap();
        assert!(config.auto_approve);
        assert_eq!(config.self_write_concurrency, 4);
        assert_eq!(config.general_id, "general");
    }

    #[test]
    fn test_rejects_zero_concurrency_and_bad_temperature() {
        let zero = FilePipelineConfig {
            self_write_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ConfigValidationError::InvalidConcurrency));

        let hot = FilePipelineConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert_eq!(hot.validate(), Err(ConfigValidationError::InvalidTemperature(3.5)));
    }
}
