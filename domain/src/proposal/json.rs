//! JSON-shaped proposals: wrapped, loose object scan, and unwrapped.
//!
//! All three strategies share one field normalizer, which accepts several
//! aliases per logical field.

use super::alias::AliasTable;
use crate::core::string::strip_code_fences;
use crate::order::change::{ChangeAction, ProposedChange};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

const ID_KEYS: &[&str] = &["agent_id", "agentId", "target_agent", "target", "agent"];
const NAME_KEYS: &[&str] = &["agent_name", "name", "soldier"];
const REPLACEMENT_KEYS: &[&str] = &[
    "new_prompt",
    "newPrompt",
    "prompt",
    "new_text",
    "replacement",
    "full_prompt",
];
const GUIDANCE_KEYS: &[&str] = &["guidance", "instructions", "direction", "self_write_guidance"];
const DESCRIPTION_KEYS: &[&str] = &["what_changed", "description", "summary", "change", "reason"];
const NEW_NAME_KEYS: &[&str] = &["new_name", "display_name"];
const NEW_DESCRIPTION_KEYS: &[&str] = &["new_description", "role_description"];

static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("static regex"));

/// Whole reply is `{"changes": [...]}` (code fences allowed)
pub fn parse_wrapped_json(reply: &str, aliases: &AliasTable) -> Option<Vec<ProposedChange>> {
    let value: Value = serde_json::from_str(&strip_code_fences(reply)).ok()?;
    let items = value.get("changes")?.as_array()?;
    non_empty(changes_from_items(items, aliases))
}

/// Standalone, non-nested `{...}` objects carrying a replacement key
pub fn parse_loose_objects(reply: &str, aliases: &AliasTable) -> Option<Vec<ProposedChange>> {
    let changes = FLAT_OBJECT
        .find_iter(reply)
        .filter_map(|m| serde_json::from_str::<Map<String, Value>>(m.as_str()).ok())
        .filter(|obj| REPLACEMENT_KEYS.iter().any(|k| obj.contains_key(*k)))
        .filter_map(|obj| change_from_object(&obj, aliases))
        .collect();
    non_empty(changes)
}

/// JSON starting at any `{` or `[`, without a wrapper key.
///
/// Accepts a single change object, a bare array of change objects, or any
/// top-level field holding such an array. Candidate offsets are tried in
/// order until one yields changes.
pub fn parse_unwrapped_json(reply: &str, aliases: &AliasTable) -> Option<Vec<ProposedChange>> {
    reply.match_indices(['{', '[']).find_map(|(start, _)| {
        let value = first_json_value(&reply[start..])?;
        non_empty(changes_from_value(&value, aliases))
    })
}

fn changes_from_value(value: &Value, aliases: &AliasTable) -> Vec<ProposedChange> {
    match value {
        Value::Array(items) => changes_from_items(items, aliases),
        Value::Object(obj) if looks_like_change(obj) => {
            change_from_object(obj, aliases).into_iter().collect()
        }
        Value::Object(obj) => obj
            .values()
            .filter_map(Value::as_array)
            .flat_map(|items| changes_from_items(items, aliases))
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalize one change object; `None` when it names no agent
pub(crate) fn change_from_object(
    obj: &Map<String, Value>,
    aliases: &AliasTable,
) -> Option<ProposedChange> {
    let raw_id = text_field(obj, ID_KEYS);
    let name = text_field(obj, NAME_KEYS);
    let agent_id = match (&raw_id, &name) {
        (Some(id), _) => aliases.resolve(id),
        (None, Some(name)) => aliases.resolve(name),
        (None, None) => return None,
    };

    Some(ProposedChange {
        agent_id,
        agent_name: name,
        action: action_field(obj),
        description: text_field(obj, DESCRIPTION_KEYS).unwrap_or_default(),
        new_prompt: text_field(obj, REPLACEMENT_KEYS).map(|p| strip_code_fences(&p)),
        guidance: text_field(obj, GUIDANCE_KEYS),
        new_name: text_field(obj, NEW_NAME_KEYS),
        new_description: text_field(obj, NEW_DESCRIPTION_KEYS),
        domain_type: text_field(obj, &["domain_type", "type"]).and_then(|t| t.parse().ok()),
        model: text_field(obj, &["model"]).and_then(|m| m.parse().ok()),
        parent_id: text_field(obj, &["parent_id", "parent"]).map(|p| aliases.resolve(&p)),
        self_written: false,
    })
}

fn changes_from_items(items: &[Value], aliases: &AliasTable) -> Vec<ProposedChange> {
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| change_from_object(obj, aliases))
        .collect()
}

fn looks_like_change(obj: &Map<String, Value>) -> bool {
    ID_KEYS
        .iter()
        .chain(NAME_KEYS)
        .any(|k| obj.get(*k).is_some_and(Value::is_string))
}

/// First non-empty string value among `keys`; string arrays are joined by lines
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let text = match obj.get(*key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    })
}

fn action_field(obj: &Map<String, Value>) -> ChangeAction {
    let Some(action) = text_field(obj, &["action"]) else {
        return ChangeAction::Update;
    };
    match action.to_lowercase().replace(['-', ' '], "_").as_str() {
        "create" | "create_agent" | "new_agent" | "add_agent" => ChangeAction::CreateAgent,
        "delete" | "delete_agent" | "deactivate" | "deactivate_agent" | "remove" | "retire" => {
            ChangeAction::DeactivateAgent
        }
        _ => ChangeAction::Update,
    }
}

/// Parse the first JSON value in `s`, ignoring trailing prose
fn first_json_value(s: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(s)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn non_empty(changes: Vec<ProposedChange>) -> Option<Vec<ProposedChange>> {
    (!changes.is_empty()).then_some(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> AliasTable {
        AliasTable::builtin()
    }

    #[test]
    fn test_wrapped_json_with_fences() {
        let reply = "```json\n{\"changes\":[{\"agent_id\":\"momentum_trader\",\"new_prompt\":\"You are...\",\"what_changed\":\"Increased sizing\"}]}\n```";
        let changes = parse_wrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].agent_id.as_str(), "momentum_trader");
        assert_eq!(changes[0].description, "Increased sizing");
    }

    #[test]
    fn test_wrapped_json_requires_changes_key() {
        let reply = r#"{"updates":[{"agent_id":"momentum_trader","new_prompt":"x"}]}"#;
        assert!(parse_wrapped_json(reply, &aliases()).is_none());
    }

    #[test]
    fn test_field_aliases() {
        let reply = r#"{"changes":[
            {"agentId":"Breakout Hunter","newPrompt":"p1","summary":"s1"},
            {"soldier":"the news analyst","instructions":["watch CPI","watch FOMC"],"display_name":"Macro Desk"}
        ]}"#;
        let changes = parse_wrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes[0].agent_id.as_str(), "breakout_hunter");
        assert_eq!(changes[0].new_prompt.as_deref(), Some("p1"));
        assert_eq!(changes[1].agent_id.as_str(), "news_analyst");
        assert_eq!(changes[1].guidance.as_deref(), Some("watch CPI\nwatch FOMC"));
        assert_eq!(changes[1].new_name.as_deref(), Some("Macro Desk"));
    }

    #[test]
    fn test_action_field() {
        let reply = r#"{"changes":[{"agent":"breakout_hunter","action":"deactivate"}]}"#;
        let changes = parse_wrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes[0].action, ChangeAction::DeactivateAgent);
    }

    #[test]
    fn test_loose_scan_skips_malformed_and_keyless() {
        let reply = "Here is my plan.\n\
            {\"agent_id\": \"momentum_trader\", \"new_prompt\": \"A\"}\n\
            and also {not json at all, \"new_prompt\": }\n\
            plus {\"agent_id\": \"news_analyst\", \"guidance\": \"no replacement key\"}\n\
            {\"target\": \"drawdown_guard\", \"replacement\": \"B\"}";
        let changes = parse_loose_objects(reply, &aliases()).unwrap();
        let ids: Vec<_> = changes.iter().map(|c| c.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["momentum_trader", "drawdown_guard"]);
    }

    #[test]
    fn test_unwrapped_single_object() {
        let reply = "Sure:\n{\"agent_id\":\"macro_analyst\",\"guidance\":{\"focus\":\"rates\"},\"direction\":\"focus on rates\"} hope that helps";
        let changes = parse_unwrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].guidance.as_deref(), Some("focus on rates"));
    }

    #[test]
    fn test_unwrapped_bare_array() {
        let reply = r#"[{"agent":"momentum","prompt":"x"},{"agent":"breakout","prompt":"y"}]"#;
        let changes = parse_unwrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes[1].agent_id.as_str(), "breakout_hunter");
    }

    #[test]
    fn test_unwrapped_any_array_field() {
        let reply = r#"{"summary":"two edits","edits":[{"agent_id":"macro_analyst","guidance":"more rates"}]}"#;
        let changes = parse_unwrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes[0].agent_id.as_str(), "macro_analyst");
    }

    #[test]
    fn test_unwrapped_rejects_prose() {
        assert!(parse_unwrapped_json("No JSON here at all.", &aliases()).is_none());
    }

    #[test]
    fn test_unwrapped_after_bracketed_prefix() {
        let reply = r#"[Lieutenant] Here you go: {"agent_id":"momentum_trader","guidance":"be patient"}"#;
        let changes = parse_unwrapped_json(reply, &aliases()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].agent_id.as_str(), "momentum_trader");
        assert_eq!(changes[0].guidance.as_deref(), Some("be patient"));
    }
}
