//! Delegation resolution from the General's reply.
//!
//! Resolution order, first match wins:
//!
//! | Step | Source | Provenance |
//! |------|--------|------------|
//! | 1 | `DELEGATE TO: <division>` style marker line | [`DelegationProvenance::Explicit`] |
//! | 2 | Keyword scan of the whole reply | [`DelegationProvenance::Inferred`] |
//! | 3 | [`Division::DEFAULT`] | [`DelegationProvenance::Defaulted`] |

use super::division::{Division, DivisionTable};
use crate::hierarchy::value_objects::AgentId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static MARKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[\s>*#_-]*(?:delegate(?:d)?(?:\s+to)?|division|assign(?:ed)?\s+to|route\s+to)[\s*_]*[:\-–][\s*_]*(?P<value>[^\n]+)$",
    )
    .expect("static regex")
});

static ORDERS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s>*#_-]*(?:orders?|instructions)[\s*_]*:[\s*_]*").expect("static regex")
});

static INFERENCE: LazyLock<Vec<(Division, Regex)>> = LazyLock::new(|| {
    Division::ALL
        .iter()
        .map(|division| {
            let alternatives = division
                .inference_keywords()
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b(?:{})\b", alternatives);
            (*division, Regex::new(&pattern).expect("keyword regex"))
        })
        .collect()
});

/// How a delegation was decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelegationProvenance {
    /// An explicit marker line named the division
    Explicit { marker: String },
    /// A division keyword appeared somewhere in the reply
    Inferred { keyword: String },
    /// Nothing matched; the fixed default division was used
    Defaulted,
}

impl DelegationProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationProvenance::Explicit { .. } => "explicit",
            DelegationProvenance::Inferred { .. } => "inferred",
            DelegationProvenance::Defaulted => "defaulted",
        }
    }

    /// True for anything other than an explicit marker
    pub fn is_uncertain(&self) -> bool {
        !matches!(self, DelegationProvenance::Explicit { .. })
    }
}

impl std::fmt::Display for DelegationProvenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelegationProvenance::Explicit { marker } => write!(f, "explicit ({})", marker),
            DelegationProvenance::Inferred { keyword } => write!(f, "inferred from '{}'", keyword),
            DelegationProvenance::Defaulted => write!(f, "defaulted"),
        }
    }
}

/// The resolved owner of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub division: Division,
    pub lieutenant_id: AgentId,
    pub provenance: DelegationProvenance,
}

/// Decide which Lieutenant owns the order described by `general_reply`.
///
/// Never fails; check [`Delegation::provenance`] to tell a confident match
/// from an inferred or defaulted one.
pub fn resolve_delegation(general_reply: &str, table: &DivisionTable) -> Delegation {
    let (division, provenance) = explicit_marker(general_reply)
        .or_else(|| inferred(general_reply))
        .unwrap_or((Division::DEFAULT, DelegationProvenance::Defaulted));

    Delegation {
        division,
        lieutenant_id: table.lieutenant_for(division),
        provenance,
    }
}

/// The part of the General's reply forwarded to the Lieutenant.
///
/// Text from the first `ORDERS:` / `ORDER:` / `INSTRUCTIONS:` line onward,
/// or the whole reply when no such line exists.
pub fn extract_forwarded_order(general_reply: &str) -> String {
    if let Some(m) = ORDERS_LINE.find(general_reply) {
        let rest = general_reply[m.end()..].trim();
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    general_reply.trim().to_string()
}

fn explicit_marker(reply: &str) -> Option<(Division, DelegationProvenance)> {
    for caps in MARKER_LINE.captures_iter(reply) {
        let value = caps["value"].to_uppercase();
        for token in value.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            if let Some(division) = Division::ALL
                .iter()
                .find(|d| d.marker_keywords().contains(&token))
            {
                let marker = caps
                    .get(0)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                return Some((*division, DelegationProvenance::Explicit { marker }));
            }
        }
    }
    None
}

fn inferred(reply: &str) -> Option<(Division, DelegationProvenance)> {
    INFERENCE.iter().find_map(|(division, regex)| {
        regex.find(reply).map(|m| {
            (
                *division,
                DelegationProvenance::Inferred {
                    keyword: m.as_str().to_lowercase(),
                },
            )
        })
    })
}
