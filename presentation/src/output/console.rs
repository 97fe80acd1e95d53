//! Console output formatter for orders and the chain of command

use colored::Colorize;
use hq_application::SeedReport;
use hq_domain::{
    Agent, ChangeDisposition, ChangeOutcome, Order, OrderResult, OrderStatus, PromptVersion, Rank,
    StageOutcome, StageRecord, SyncReport, truncate,
};
use serde::Serialize;

/// Formats pipeline and hierarchy results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Full report for one order run
    pub fn format_order_result(result: &OrderResult) -> String {
        let mut output = String::new();
        let order = &result.order;

        output.push_str(&Self::header("Order Report"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Order:".cyan().bold(), order.id));
        output.push_str(&format!("{} {}\n", "Command:".cyan().bold(), order.command));
        output.push_str(&format!(
            "{} {}\n",
            "Status:".cyan().bold(),
            Self::status_label(order.status)
        ));
        if let Some(delegation) = &result.delegation {
            output.push_str(&format!(
                "{} {} ({}, {})\n",
                "Delegated to:".cyan().bold(),
                delegation.lieutenant_id,
                delegation.division,
                delegation.provenance
            ));
        }
        if let Some(strategy) = &result.parse_strategy {
            output.push_str(&format!("{} {}\n", "Parsed via:".cyan().bold(), strategy));
        }

        output.push_str(&Self::section_header("Stages"));
        for record in &result.stages {
            output.push_str(&Self::stage_line(record));
            output.push('\n');
        }

        if !result.changes.is_empty() {
            output.push_str(&Self::section_header("Changes"));
            for change in &result.changes {
                output.push_str(&Self::change_block(change));
            }
        } else if !order.changes.is_empty() {
            output.push_str(&Self::section_header("Recorded Changes"));
            for change in &order.changes {
                output.push_str(&format!(
                    "  {} {} {}\n",
                    "*".yellow(),
                    change.action.as_str().bold(),
                    change.display_name()
                ));
                if !change.description.is_empty() {
                    output.push_str(&format!("    {}\n", change.description.dimmed()));
                }
            }
        }

        if let Some(sync) = &result.sync {
            output.push_str(&format!("\n{} {}\n", "Sync:".cyan().bold(), Self::sync_line(sync)));
        }

        if !result.failures.is_empty() {
            output.push_str(&format!("\n{}\n", "Failures:".red().bold()));
            for failure in &result.failures {
                let line = format!("  * {}", failure);
                if failure.kind.is_soft() {
                    output.push_str(&format!("{}\n", line.yellow()));
                } else {
                    output.push_str(&format!("{}\n", line.red()));
                }
            }
        }

        if let Some(error) = &order.error {
            output.push_str(&format!("\n{} {}\n", "Error:".red().bold(), error));
        }

        if order.status == OrderStatus::Pending && !order.changes.is_empty() {
            output.push_str(&format!(
                "\n{} hq approve {}\n",
                "Awaiting approval:".yellow().bold(),
                order.id
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Pretty JSON for any serializable result
    pub fn format_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    /// One line per order, newest first
    pub fn format_orders(orders: &[Order]) -> String {
        if orders.is_empty() {
            return format!("{}\n", "No orders yet.".dimmed());
        }
        let mut output = String::new();
        for order in orders {
            let lieutenant = order
                .lieutenant_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "{} {:<9} {} {:<22} {}\n",
                order.id.to_string().dimmed(),
                Self::status_label(order.status),
                order.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                lieutenant,
                truncate(&order.command, 60)
            ));
        }
        output
    }

    /// Render agents as a General → Lieutenant → Soldier tree
    pub fn format_agents(agents: &[Agent]) -> String {
        if agents.is_empty() {
            return format!("{}\n", "No agents. Run `hq seed` first.".dimmed());
        }

        let mut output = String::new();
        let mut roots: Vec<&Agent> = agents
            .iter()
            .filter(|a| {
                a.parent_id
                    .as_ref()
                    .is_none_or(|p| agents.iter().all(|other| &other.id != p))
            })
            .collect();
        roots.sort_by_key(|a| (a.rank, a.name.clone()));

        for root in roots {
            Self::push_agent_tree(&mut output, root, agents, 0);
        }
        output
    }

    fn push_agent_tree(output: &mut String, agent: &Agent, roster: &[Agent], depth: usize) {
        let indent = "  ".repeat(depth);
        let name = match agent.rank {
            Rank::General => agent.name.magenta().bold(),
            Rank::Lieutenant => agent.name.cyan().bold(),
            Rank::Soldier => agent.name.normal(),
        };
        let mut line = format!("{}{} {}", indent, name, format!("[{}]", agent.id).dimmed());
        if let Some(model) = &agent.model {
            line.push_str(&format!(" {}", model.to_string().yellow()));
        }
        if !agent.active {
            line.push_str(&format!(" {}", "(inactive)".red()));
        }
        output.push_str(&line);
        output.push('\n');

        let mut children: Vec<&Agent> = roster
            .iter()
            .filter(|a| a.parent_id.as_ref() == Some(&agent.id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in children {
            Self::push_agent_tree(output, child, roster, depth + 1);
        }
    }

    /// Header line plus the full current document
    pub fn format_agent(agent: &Agent) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} {} ({}, {})\n",
            agent.name.bold(),
            format!("[{}]", agent.id).dimmed(),
            agent.rank,
            agent.domain_type
        ));
        if let Some(description) = &agent.description {
            output.push_str(&format!("{}\n", description.dimmed()));
        }
        output.push_str(&Self::section_header("Current Prompt"));
        output.push_str(&agent.current_prompt);
        output.push('\n');
        output
    }

    pub fn format_versions(versions: &[PromptVersion]) -> String {
        if versions.is_empty() {
            return format!("{}\n", "No versions.".dimmed());
        }
        let mut output = String::new();
        for version in versions {
            let marker = if version.active {
                "*".green().bold()
            } else {
                " ".normal()
            };
            output.push_str(&format!(
                "{} v{:<3} {} {:<18} {}\n",
                marker,
                version.version,
                version.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                version.author,
                truncate(&version.notes, 60)
            ));
        }
        output
    }

    pub fn format_sync(report: &SyncReport) -> String {
        format!("{} {}\n", "Sync:".cyan().bold(), Self::sync_line(report))
    }

    pub fn format_seed_report(report: &SeedReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} {} created, {} already present\n",
            "Seed:".cyan().bold(),
            report.created.len(),
            report.skipped.len()
        ));
        for (agent_id, reason) in &report.refused {
            output.push_str(&format!("  {} {}: {}\n", "x".red(), agent_id, reason));
        }
        output.push_str(&Self::format_sync(&report.sync));
        output
    }

    pub fn format_config(values: &[(String, String)]) -> String {
        if values.is_empty() {
            return format!("{}\n", "No config values stored.".dimmed());
        }
        values
            .iter()
            .map(|(key, value)| format!("{} = {}\n", key.bold(), value))
            .collect()
    }

    fn stage_line(record: &StageRecord) -> String {
        let mark = match record.outcome {
            StageOutcome::Success => "v".green(),
            StageOutcome::Partial => "~".yellow(),
            StageOutcome::Skipped => "-".dimmed(),
            StageOutcome::Failed => "x".red(),
        };
        format!(
            "  {} {:<11} {:>6}ms  {}",
            mark,
            record.stage.display_name(),
            record.elapsed_ms,
            record.detail
        )
    }

    fn change_block(change: &ChangeOutcome) -> String {
        let label = match &change.disposition {
            ChangeDisposition::Committed { version } => format!("committed v{}", version).green(),
            ChangeDisposition::Deactivated => "deactivated".green(),
            ChangeDisposition::Pending => "pending".yellow(),
            ChangeDisposition::Dropped { reason } => format!("dropped: {}", reason).red(),
            ChangeDisposition::Refused { reason } => format!("refused: {}", reason).red(),
            ChangeDisposition::SelfWriteFailed { error } => {
                format!("self-write failed: {}", error).red()
            }
        };
        let name = change.agent_name.as_deref().unwrap_or(change.agent_id.as_str());

        let mut output = format!(
            "\n{} {} {}\n",
            format!("── {} ──", name).yellow().bold(),
            change.action.as_str().dimmed(),
            label
        );
        if !change.description.is_empty() {
            output.push_str(&format!("{}\n", change.description));
        }
        if let Some(after) = &change.after {
            output.push_str(&Self::indent(&truncate(after, 400), "  │ "));
            output.push('\n');
        }
        output
    }

    fn sync_line(report: &SyncReport) -> String {
        if report.is_noop() {
            format!("{} leaders checked, all up to date", report.agents_examined)
        } else {
            format!(
                "{} of {} leaders updated",
                report.versions_created, report.agents_examined
            )
        }
    }

    fn status_label(status: OrderStatus) -> colored::ColoredString {
        match status {
            OrderStatus::Pending => status.as_str().yellow(),
            OrderStatus::Approved => status.as_str().cyan(),
            OrderStatus::Executed => status.as_str().green(),
            OrderStatus::Rejected => status.as_str().red(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hq_domain::{AgentId, ChangeAction, DomainType, NewAgent, Stage};

    fn plain() {
        colored::control::set_override(false);
    }

    fn agent(new: NewAgent) -> Agent {
        Agent::from_new(&new, chrono::Utc::now())
    }

    #[test]
    fn test_agents_render_as_tree() {
        plain();
        let roster = vec![
            agent(
                NewAgent::soldier("Momentum Trader", "m")
                    .with_parent("trading_lieutenant")
                    .with_domain(DomainType::Trader),
            ),
            agent(
                NewAgent::soldier("General", "g")
                    .with_id("general")
                    .with_rank(Rank::General),
            ),
            agent(
                NewAgent::soldier("Trading Lieutenant", "t")
                    .with_id("trading_lieutenant")
                    .with_rank(Rank::Lieutenant)
                    .with_parent("general"),
            ),
        ];

        let output = ConsoleFormatter::format_agents(&roster);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("General [general]"));
        assert!(lines[1].starts_with("  Trading Lieutenant"));
        assert!(lines[2].starts_with("    Momentum Trader"));
    }

    #[test]
    fn test_order_report_lists_stages_and_changes() {
        plain();
        let mut order = Order::new("tighten stops");
        order.status = OrderStatus::Executed;
        let mut result = OrderResult::new(order);
        result.stages.push(StageRecord::new(
            Stage::General,
            StageOutcome::Success,
            "replied",
        ));
        result.changes.push(ChangeOutcome {
            agent_id: AgentId::new("momentum_trader"),
            agent_name: Some("Momentum Trader".to_string()),
            action: ChangeAction::Update,
            description: "tighter stops".to_string(),
            before: Some("old".to_string()),
            after: Some("new text".to_string()),
            disposition: ChangeDisposition::Committed { version: 3 },
        });
        result.sync = Some(SyncReport::default());

        let output = ConsoleFormatter::format_order_result(&result);
        assert!(output.contains("Command: tighten stops"));
        assert!(output.contains("Status: executed"));
        assert!(output.contains("General"));
        assert!(output.contains("committed v3"));
        assert!(output.contains("  │ new text"));
        assert!(output.contains("all up to date"));
        assert!(!output.contains("Awaiting approval"));
    }

    #[test]
    fn test_json_contains_order() {
        let result = OrderResult::new(Order::new("size down"));
        let json = ConsoleFormatter::format_json(&result);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["order"]["command"], "size down");
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "> "), "> a\n> b");
    }
}
