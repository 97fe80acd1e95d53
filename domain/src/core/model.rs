//! Model value object representing an assigned LLM

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Model identifier assigned to an agent (Value Object)
///
/// Identifiers follow the `provider/model` convention used by
/// OpenAI-compatible routers. Anything not listed here is carried
/// through as [`Model::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    ClaudeSonnet45,
    ClaudeHaiku45,
    Gpt5,
    Gpt5Mini,
    Gemini25Pro,
    Gemini25Flash,
    DeepseekChat,
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::ClaudeSonnet45 => "anthropic/claude-sonnet-4.5",
            Model::ClaudeHaiku45 => "anthropic/claude-haiku-4.5",
            Model::Gpt5 => "openai/gpt-5",
            Model::Gpt5Mini => "openai/gpt-5-mini",
            Model::Gemini25Pro => "google/gemini-2.5-pro",
            Model::Gemini25Flash => "google/gemini-2.5-flash",
            Model::DeepseekChat => "deepseek/deepseek-chat",
            Model::Custom(s) => s,
        }
    }

    /// The fixed model tried once when a primary call fails
    pub fn fallback() -> Model {
        Model::Gpt5Mini
    }

    /// Check if this is a Claude model
    pub fn is_claude(&self) -> bool {
        matches!(self, Model::ClaudeSonnet45 | Model::ClaudeHaiku45)
    }
}

impl Default for Model {
    /// Returns the default model (Claude Sonnet 4.5)
    fn default() -> Self {
        Model::ClaudeSonnet45
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "anthropic/claude-sonnet-4.5" => Model::ClaudeSonnet45,
            "anthropic/claude-haiku-4.5" => Model::ClaudeHaiku45,
            "openai/gpt-5" => Model::Gpt5,
            "openai/gpt-5-mini" => Model::Gpt5Mini,
            "google/gemini-2.5-pro" => Model::Gemini25Pro,
            "google/gemini-2.5-flash" => Model::Gemini25Flash,
            "deepseek/deepseek-chat" => Model::DeepseekChat,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(model) = s.parse();
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_roundtrip() {
        for model in [Model::ClaudeSonnet45, Model::Gpt5Mini, Model::DeepseekChat] {
            let s = model.to_string();
            let parsed: Model = s.parse().unwrap();
            assert_eq!(model, parsed);
        }
    }

    #[test]
    fn test_custom_model() {
        let model: Model = "mistral/mistral-large".parse().unwrap();
        assert_eq!(model, Model::Custom("mistral/mistral-large".to_string()));
        assert_eq!(model.to_string(), "mistral/mistral-large");
    }

    #[test]
    fn test_fallback_differs_from_default() {
        assert_ne!(Model::fallback(), Model::default());
        assert!(Model::default().is_claude());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&Model::Gpt5).unwrap();
        assert_eq!(json, "\"openai/gpt-5\"");
        let model: Model = serde_json::from_str("\"openai/gpt-5\"").unwrap();
        assert_eq!(model, Model::Gpt5);
    }
}
