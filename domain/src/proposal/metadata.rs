//! Name/description metadata carried by a change
//!
//! Priority per field, first non-empty wins:
//!
//! - name: explicit `new_name` > identity line > rename phrase in the description
//! - description: explicit `new_description` > identity line tail

use crate::order::change::ProposedChange;
use regex::Regex;
use std::sync::LazyLock;

static IDENTITY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*[Yy]ou are\s+(?:the\s+|an?\s+)?(?P<name>[A-Z][\w'&]*(?:[ \t]+[A-Z][\w'&]*)*)[ \t]*(?:[,:\-–—][ \t]*(?P<desc>.*?))?[ \t]*\.?[ \t]*$",
    )
    .expect("static regex")
});

static RENAME_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\brenam(?:e|ed|ing)\b.*?\bto\s+["'“]?(?P<name>[^"'”\n.,;]+)"#)
        .expect("static regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ChangeMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

pub fn extract_metadata(change: &ProposedChange) -> ChangeMetadata {
    let identity = change.replacement().and_then(identity_line);

    let name = explicit(change.new_name.as_deref())
        .or_else(|| identity.as_ref().map(|(name, _)| name.clone()))
        .or_else(|| rename_target(&change.description));

    let description = explicit(change.new_description.as_deref())
        .or_else(|| identity.and_then(|(_, desc)| desc));

    ChangeMetadata { name, description }
}

/// `You are the <Name>, <description>` on the first non-blank line
fn identity_line(text: &str) -> Option<(String, Option<String>)> {
    let first = text.lines().find(|l| !l.trim().is_empty())?;
    let caps = IDENTITY_LINE.captures(first)?;
    let name = caps["name"].trim().to_string();
    let desc = caps
        .name("desc")
        .map(|d| d.as_str().trim().to_string())
        .filter(|d| !d.is_empty());
    Some((name, desc))
}

fn rename_target(description: &str) -> Option<String> {
    let caps = RENAME_PHRASE.captures(description)?;
    let name = caps["name"].trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn explicit(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
