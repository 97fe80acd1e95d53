//! Administrative `CREATE AGENT` / `DELETE AGENT` blocks
//!
//! ```text
//! CREATE AGENT
//! NAME: Volatility Surfer
//! TYPE: trader
//! MODEL: openai/gpt-5-mini
//! PARENT: Trading Lieutenant
//! REASON: cover high-volatility regimes
//! PROMPT:
//! You are the Volatility Surfer, ...
//! END
//! ```

use super::alias::AliasTable;
use crate::core::string::strip_code_fences;
use crate::hierarchy::value_objects::AgentId;
use crate::order::change::{ChangeAction, ProposedChange};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[\s#*>]*(?P<verb>create|new|add|delete|remove|deactivate|retire)[ _-]agent\b[^\n]*$",
    )
    .expect("static regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*[-*_]*\s*(?P<key>name|id|type|model|parent|reason|description|role|prompt)\s*[*_]*\s*:\s*(?P<value>.*)$",
    )
    .expect("static regex")
});

/// Parse the first well-formed administrative block in `reply`.
///
/// Yields exactly one change, or `None` when no header is present or no
/// header is followed by the required fields.
pub fn parse_admin_block(reply: &str, aliases: &AliasTable) -> Option<Vec<ProposedChange>> {
    HEADER.captures_iter(reply).find_map(|caps| {
        let header = caps.get(0)?;
        let fields = read_fields(&reply[header.end()..]);
        let change = match caps["verb"].to_lowercase().as_str() {
            "create" | "new" | "add" => create_change(&fields, aliases),
            _ => deactivate_change(&fields, aliases),
        }?;
        change.is_valid().then(|| vec![change])
    })
}

fn read_fields(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut prompt: Option<Vec<&str>> = None;
    let mut fenced = false;

    for line in body.lines() {
        if let Some(lines) = prompt.as_mut() {
            if is_fence(line) && (fenced || lines.iter().all(|l| l.trim().is_empty())) {
                lines.push(line);
                if fenced {
                    // Closing fence ends the prompt
                    break;
                }
                fenced = true;
                continue;
            }
            if !fenced && is_block_end(line) {
                break;
            }
            lines.push(line);
            continue;
        }
        if is_block_end(line) {
            if !fields.is_empty() {
                break;
            }
            continue;
        }
        let Some(caps) = FIELD.captures(line) else {
            continue;
        };
        let key = caps.name("key").map_or("", |m| m.as_str()).to_uppercase();
        let value = caps.name("value").map_or("", |m| m.as_str()).trim();
        if key == "PROMPT" {
            fenced = is_fence(value);
            prompt = Some(if value.is_empty() { Vec::new() } else { vec![value] });
        } else if !value.is_empty() {
            fields.entry(key).or_insert_with(|| value.to_string());
        }
    }

    if let Some(lines) = prompt {
        let text = strip_code_fences(&lines.join("\n"));
        if !text.is_empty() {
            fields.insert("PROMPT".to_string(), text);
        }
    }
    fields
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// `END` markers, or a `---` / closing fence outside a fenced prompt
fn is_block_end(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('*').trim();
    matches!(
        trimmed.to_uppercase().as_str(),
        "END" | "END PROMPT" | "END AGENT" | "---" | "```"
    )
}

fn create_change(fields: &HashMap<String, String>, aliases: &AliasTable) -> Option<ProposedChange> {
    let name = fields.get("NAME")?;
    let prompt = fields.get("PROMPT")?;
    let id = fields
        .get("ID")
        .map(|id| AgentId::from_name(id))
        .unwrap_or_else(|| AgentId::from_name(name));

    let reason = fields.get("REASON").cloned();
    Some(ProposedChange {
        agent_id: id,
        agent_name: Some(name.clone()),
        action: ChangeAction::CreateAgent,
        description: reason.unwrap_or_else(|| format!("Create agent {}", name)),
        new_prompt: Some(prompt.clone()),
        new_name: Some(name.clone()),
        new_description: fields
            .get("DESCRIPTION")
            .or_else(|| fields.get("ROLE"))
            .cloned(),
        domain_type: fields.get("TYPE").and_then(|t| t.parse().ok()),
        model: fields.get("MODEL").and_then(|m| m.parse().ok()),
        parent_id: fields.get("PARENT").map(|p| aliases.resolve(p)),
        ..Default::default()
    })
}

fn deactivate_change(
    fields: &HashMap<String, String>,
    aliases: &AliasTable,
) -> Option<ProposedChange> {
    let name = fields.get("NAME");
    let id = match (fields.get("ID"), name) {
        (Some(id), _) => aliases.resolve(id),
        (None, Some(name)) => aliases.resolve(name),
        (None, None) => return None,
    };

    let description = fields
        .get("REASON")
        .cloned()
        .unwrap_or_else(|| format!("Deactivate agent {}", id));
    Some(ProposedChange {
        agent_id: id,
        agent_name: name.cloned(),
        action: ChangeAction::DeactivateAgent,
        description,
        ..Default::default()
    })
}
