//! DIRECT REPORTS block generation and synchronization.
//!
//! Every leader document (General, Lieutenant) carries a block delimited by
//! [`BLOCK_BEGIN`] / [`BLOCK_END`] listing its live children. The functions
//! here are pure: they take a roster snapshot and produce text. Persisting
//! the result is the hierarchy service's job.
//!
//! ```text
//! <!-- DIRECT REPORTS:BEGIN -->
//! ## DIRECT REPORTS
//! - Trading Lieutenant [trading_lieutenant]
//!   - Momentum Trader [momentum_trader]
//! <!-- DIRECT REPORTS:END -->
//! ```

use super::entities::{Agent, Rank};
use super::value_objects::AgentId;
use regex::Regex;
use std::sync::LazyLock;

pub const BLOCK_BEGIN: &str = "<!-- DIRECT REPORTS:BEGIN -->";
pub const BLOCK_END: &str = "<!-- DIRECT REPORTS:END -->";

const BLOCK_HEADING: &str = "## DIRECT REPORTS";

static REPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*)-\s+(?P<name>.+?)\s+\[(?P<id>[^\[\]\s]+)\]\s*$")
        .expect("static regex")
});

/// One entry read back from a DIRECT REPORTS block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectReport {
    pub id: AgentId,
    pub name: String,
    /// 0 for top-level entries, 1 for entries nested under a lieutenant
    pub depth: usize,
}

/// Build the DIRECT REPORTS block for `leader` from a roster snapshot.
///
/// - General: every active lieutenant, each with its active soldiers
/// - Lieutenant: its active soldiers
/// - Soldier: `None`
///
/// Ordering is by name, then id, so the output is stable across calls.
pub fn generate_direct_reports_block(leader: &Agent, roster: &[Agent]) -> Option<String> {
    let mut lines = vec![BLOCK_BEGIN.to_string(), BLOCK_HEADING.to_string()];

    match leader.rank {
        Rank::Soldier => return None,
        Rank::General => {
            let lieutenants = active_with_rank(roster, Rank::Lieutenant, None);
            if lieutenants.is_empty() {
                lines.push("- (no lieutenants assigned)".to_string());
            }
            for lieutenant in lieutenants {
                lines.push(format!("- {}", entry(lieutenant)));
                let soldiers = active_with_rank(roster, Rank::Soldier, Some(&lieutenant.id));
                if soldiers.is_empty() {
                    lines.push("  - (no soldiers assigned)".to_string());
                }
                for soldier in soldiers {
                    lines.push(format!("  - {}", entry(soldier)));
                }
            }
        }
        Rank::Lieutenant => {
            let soldiers = active_with_rank(roster, Rank::Soldier, Some(&leader.id));
            if soldiers.is_empty() {
                lines.push("- (no soldiers assigned)".to_string());
            }
            for soldier in soldiers {
                lines.push(format!("- {}", entry(soldier)));
            }
        }
    }

    lines.push(BLOCK_END.to_string());
    Some(lines.join("\n"))
}

/// Replace the sentinel-delimited block in `text` with `block`.
///
/// If no begin sentinel exists the block is appended after a blank line. A
/// begin sentinel without a matching end is treated as running to the end of
/// the document.
pub fn replace_direct_reports_block(text: &str, block: &str) -> String {
    let Some(begin) = text.find(BLOCK_BEGIN) else {
        let base = text.trim_end();
        if base.is_empty() {
            return block.to_string();
        }
        return format!("{}\n\n{}", base, block);
    };

    let suffix = text[begin..]
        .find(BLOCK_END)
        .map(|offset| &text[begin + offset + BLOCK_END.len()..])
        .unwrap_or("");

    format!("{}{}{}", &text[..begin], block, suffix)
}

/// Read back the entries of the DIRECT REPORTS block in `text`.
///
/// Placeholder lines such as `(no soldiers assigned)` are skipped. Returns an
/// empty list when the document has no block.
pub fn parse_direct_reports_block(text: &str) -> Vec<DirectReport> {
    let Some(begin) = text.find(BLOCK_BEGIN) else {
        return Vec::new();
    };
    let body = &text[begin + BLOCK_BEGIN.len()..];
    let body = match body.find(BLOCK_END) {
        Some(end) => &body[..end],
        None => body,
    };

    body.lines()
        .filter_map(|line| {
            let caps = REPORT_LINE.captures(line)?;
            Some(DirectReport {
                id: AgentId::new(&caps["id"]),
                name: caps["name"].to_string(),
                depth: caps["indent"].len() / 2,
            })
        })
        .collect()
}

fn active_with_rank<'a>(
    roster: &'a [Agent],
    rank: Rank,
    parent: Option<&AgentId>,
) -> Vec<&'a Agent> {
    let mut agents: Vec<&Agent> = roster
        .iter()
        .filter(|a| a.active && a.rank == rank)
        .filter(|a| parent.is_none_or(|p| a.parent_id.as_ref() == Some(p)))
        .collect();
    agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    agents
}

fn entry(agent: &Agent) -> String {
    // Brackets are reserved for the id column
    let name = agent.name.replace('[', "(").replace(']', ")");
    format!("{} [{}]", name.trim(), agent.id)
}
