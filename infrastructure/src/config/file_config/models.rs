//! Model configuration from TOML (`[models]` section)

use super::ConfigValidationError;
use hq_domain::Model;
use serde::{Deserialize, Serialize};

/// Model selection from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// default = "anthropic/claude-sonnet-4.5"   # agents without an assigned model
/// fallback = "openai/gpt-5-mini"            # retried once when a call fails
/// ```
///
/// The persisted `default_model` / `fallback_model` system config values
/// take precedence over these at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    pub default: Option<String>,
    pub fallback: Option<String>,
}

impl FileModelsConfig {
    pub fn parse_default(&self) -> Option<Model> {
        parse_model(self.default.as_deref())
    }

    pub fn parse_fallback(&self) -> Option<Model> {
        parse_model(self.fallback.as_deref())
    }

    pub(super) fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [("models.default", &self.default), ("models.fallback", &self.fallback)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigValidationError::EmptyModelName {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_model(value: Option<&str>) -> Option<Model> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    // Model::from_str is infallible; unknown names become Custom(...)
    let Ok(model) = value.parse::<Model>();
    Some(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_custom_models() {
        let config = FileModelsConfig {
            default: Some("openai/gpt-5".to_string()),
            fallback: Some("mistral/mistral-large".to_string()),
        };
        assert_eq!(config.parse_default(), Some(Model::Gpt5));
        assert_eq!(
            config.parse_fallback(),
            Some(Model::Custom("mistral/mistral-large".to_string()))
        );
    }

    #[test]
    fn test_unset_models() {
        let config = FileModelsConfig::default();
        assert!(config.parse_default().is_none());
        assert!(config.validate().is_ok());
    }
}
