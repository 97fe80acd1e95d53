//! Configuration value objects for the domain layer

pub mod config_key;

pub use config_key::{
    AUTO_APPROVE, ConfigKeyInfo, DEFAULT_MODEL, FALLBACK_MODEL, ValueKind, known_keys, lookup_key,
    normalize_value, parse_bool,
};
