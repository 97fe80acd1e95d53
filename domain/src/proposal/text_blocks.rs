//! Structured text sections
//!
//! ```text
//! AGENT: Momentum Trader
//! CHANGES: Increase base position size
//! NEW PROMPT:
//! You are the Momentum Trader, ...
//! ---
//! SOLDIER: News Analyst
//! GUIDANCE: Weight central bank commentary higher
//! ```

use super::alias::AliasTable;
use crate::core::string::strip_code_fences;
use crate::order::change::ProposedChange;
use regex::Regex;
use std::sync::LazyLock;

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|={3,}|\*{3,})\s*$").expect("static regex"));

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*[#*_>-]*\s*(?P<label>agent|soldier|target|name|new prompt|updated prompt|guidance|changes)\s*[*_]*\s*:\s*[*_]*\s*(?P<rest>.*)$",
    )
    .expect("static regex")
});

/// Unindented, non-bulleted section header (`AGENT:`, `**Name:**`, `## SOLDIER:`)
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*|[*_]{1,2})?(?P<label>agent|soldier|target|name)\s*[*_]*\s*:")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Name,
    NewPrompt,
    Guidance,
    Changes,
}

impl Label {
    fn from_capture(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "new prompt" | "updated prompt" => Label::NewPrompt,
            "guidance" => Label::Guidance,
            "changes" => Label::Changes,
            _ => Label::Name,
        }
    }
}

#[derive(Default)]
struct Section {
    name: Option<String>,
    new_prompt: Vec<String>,
    guidance: Vec<String>,
    changes: Vec<String>,
}

impl Section {
    fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.new_prompt.is_empty()
            && self.guidance.is_empty()
            && self.changes.is_empty()
    }

    fn into_change(self, aliases: &AliasTable) -> Option<ProposedChange> {
        let name = self.name?;
        let new_prompt = join(&self.new_prompt).map(|p| strip_code_fences(&p));
        let changes = join(&self.changes);
        let guidance = join(&self.guidance).or_else(|| {
            // Without finished text, the CHANGES notes are all the agent gets
            if new_prompt.is_none() {
                changes.clone()
            } else {
                None
            }
        });

        Some(ProposedChange {
            agent_id: aliases.resolve(&name),
            agent_name: Some(name),
            description: changes.unwrap_or_default(),
            new_prompt,
            guidance,
            ..Default::default()
        })
    }
}

/// Parse `AGENT:` / `SOLDIER:` sections separated by header lines or
/// `---` / `===` / `***` separators.
pub fn parse_text_blocks(reply: &str, aliases: &AliasTable) -> Option<Vec<ProposedChange>> {
    let mut sections = Vec::new();
    let mut current = Section::default();
    let mut label: Option<Label> = None;
    let lines: Vec<&str> = reply.lines().collect();

    for (i, &line) in lines.iter().enumerate() {
        // Inside a prompt body only a new AGENT/SOLDIER section is structure
        let in_prompt = label == Some(Label::NewPrompt);

        if SEPARATOR.is_match(line) {
            if in_prompt && !separates_sections(&lines[i + 1..]) {
                push_line(&mut current, Label::NewPrompt, line.to_string());
                continue;
            }
            sections.push(std::mem::take(&mut current));
            label = None;
            continue;
        }

        if in_prompt && !is_section_header(line, true) {
            push_line(&mut current, Label::NewPrompt, line.to_string());
            continue;
        }

        if let Some(caps) = LABEL.captures(line) {
            let found = Label::from_capture(caps.name("label").map_or("", |m| m.as_str()));
            let rest = caps.name("rest").map_or("", |m| m.as_str()).trim().to_string();

            if found == Label::Name {
                if current.name.is_some() {
                    sections.push(std::mem::take(&mut current));
                }
                if !rest.is_empty() {
                    current.name = Some(rest.trim_matches(['*', '_']).trim().to_string());
                }
                label = None;
                continue;
            }

            label = Some(found);
            if !rest.is_empty() {
                push_line(&mut current, found, rest);
            }
            continue;
        }

        if let Some(active) = label {
            push_line(&mut current, active, line.to_string());
        }
    }
    sections.push(current);

    let changes: Vec<ProposedChange> = sections
        .into_iter()
        .filter(|s| !s.is_blank())
        .filter_map(|s| s.into_change(aliases))
        .collect();
    (!changes.is_empty()).then_some(changes)
}

/// `agents_only` restricts the match to `AGENT:` / `SOLDIER:` headers
fn is_section_header(line: &str, agents_only: bool) -> bool {
    SECTION_HEADER.captures(line).is_some_and(|caps| {
        !agents_only
            || caps
                .name("label")
                .is_some_and(|m| matches!(m.as_str().to_lowercase().as_str(), "agent" | "soldier"))
    })
}

/// A separator ends a prompt only before another section or at the end of the reply
fn separates_sections(rest: &[&str]) -> bool {
    rest.iter()
        .find(|line| !line.trim().is_empty())
        .is_none_or(|line| is_section_header(line, false))
}

fn push_line(section: &mut Section, label: Label, line: String) {
    match label {
        Label::NewPrompt => section.new_prompt.push(line),
        Label::Guidance => section.guidance.push(line),
        Label::Changes => section.changes.push(line),
        Label::Name => {}
    }
}

fn join(lines: &[String]) -> Option<String> {
    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}
