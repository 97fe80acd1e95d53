//! System config key registry.
//!
//! Defines the known keys of the persisted `SystemConfig` store: name,
//! description, and value kind. Used by the `hq config get|set` commands and
//! by the pipeline when it resolves the effective auto-approve flag and
//! models.

use crate::core::error::DomainError;

pub const AUTO_APPROVE: &str = "auto_approve";
pub const DEFAULT_MODEL: &str = "default_model";
pub const FALLBACK_MODEL: &str = "fallback_model";

/// Shape of the value stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `true`/`false` (also accepts `yes`/`no`, `on`/`off`, `1`/`0`)
    Bool,
    /// A model id such as `openai/gpt-5`
    Model,
}

/// Metadata for a single config key.
#[derive(Debug, Clone)]
pub struct ConfigKeyInfo {
    pub key: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
}

/// All known config keys with their metadata.
pub fn known_keys() -> &'static [ConfigKeyInfo] {
    &KNOWN_KEYS
}

pub fn lookup_key(key: &str) -> Option<&'static ConfigKeyInfo> {
    KNOWN_KEYS.iter().find(|k| k.key == key)
}

static KNOWN_KEYS: [ConfigKeyInfo; 3] = [
    ConfigKeyInfo {
        key: AUTO_APPROVE,
        description: "Commit parsed changes immediately instead of leaving orders pending",
        kind: ValueKind::Bool,
    },
    ConfigKeyInfo {
        key: DEFAULT_MODEL,
        description: "Model used for agents without an assigned model",
        kind: ValueKind::Model,
    },
    ConfigKeyInfo {
        key: FALLBACK_MODEL,
        description: "Model retried once when the primary call fails",
        kind: ValueKind::Model,
    },
];

/// Lenient boolean parsing for config values
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Validate `value` for `key` and return its canonical stored form.
///
/// Unknown keys are accepted verbatim; the store is a flat key/value map.
pub fn normalize_value(key: &str, value: &str) -> Result<String, DomainError> {
    let invalid = || DomainError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match lookup_key(key).map(|info| info.kind) {
        Some(ValueKind::Bool) => parse_bool(value).map(|b| b.to_string()).ok_or_else(invalid),
        Some(ValueKind::Model) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(invalid())
            } else {
                Ok(trimmed.to_string())
            }
        }
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_existing_key() {
        let info = lookup_key("auto_approve").unwrap();
        assert_eq!(info.kind, ValueKind::Bool);
        assert!(lookup_key("nonexistent.key").is_none());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_normalize_bool_value() {
        assert_eq!(normalize_value(AUTO_APPROVE, "On").unwrap(), "true");
        assert!(normalize_value(AUTO_APPROVE, "maybe").is_err());
    }

    #[test]
    fn test_normalize_model_value() {
        assert_eq!(normalize_value(DEFAULT_MODEL, " openai/gpt-5 ").unwrap(), "openai/gpt-5");
        assert!(normalize_value(FALLBACK_MODEL, "  ").is_err());
        assert_eq!(normalize_value("custom.key", "anything").unwrap(), "anything");
    }
}
