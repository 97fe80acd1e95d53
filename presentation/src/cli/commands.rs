//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use hq_domain::{AgentId, OrderId};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Full,
    /// JSON output
    Json,
}

/// CLI arguments for hq
#[derive(Parser, Debug)]
#[command(name = "hq")]
#[command(author, version, about = "Chain-of-command prompt orchestrator")]
#[command(long_about = r#"
hq turns one operator command into reviewed edits of a hierarchy of agent
prompt documents.

The command travels down the chain of command:
1. General: assesses the command and delegates to one division
2. Lieutenant: proposes changes to its soldiers' documents
3. Soldiers: rewrite their own documents when given guidance

Changes are committed immediately when auto-approve is on; otherwise the
order stays pending until `hq approve <ORDER_ID>`.

Configuration files are loaded from (in priority order):
1. HQ_* environment variables
2. --config <path>             Explicit config file
3. ./hq.toml                   Project-level config
4. ~/.config/hq/config.toml    Global config

Example:
  hq seed
  hq submit "Traders are overtrading in chop; make them wait for volume"
  hq approve 3f1c2a9e-...
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue a command to the General
    Submit {
        /// Free-text operator command
        command: String,

        /// Commit accepted changes immediately
        #[arg(long, conflicts_with = "no_auto_approve")]
        auto_approve: bool,

        /// Leave the order pending for manual approval
        #[arg(long)]
        no_auto_approve: bool,
    },

    /// Commit the changes recorded on a pending order
    Approve { order_id: OrderId },

    /// Reject a pending order
    Reject { order_id: OrderId },

    /// List recent orders
    Orders {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show the chain of command
    Agents {
        /// Include deactivated agents
        #[arg(long)]
        all: bool,
    },

    /// Show one agent's current document
    Show { agent_id: AgentId },

    /// List an agent's prompt versions
    Versions { agent_id: AgentId },

    /// Re-activate an earlier prompt version
    Rollback { agent_id: AgentId, version: u32 },

    /// Rewrite every leader's DIRECT REPORTS block
    Sync,

    /// Load a roster (the built-in one when FILE is omitted)
    Seed { file: Option<PathBuf> },

    /// Read or write persisted system config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configuration file locations and the effective settings
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print one value, or all values when KEY is omitted
    Get { key: Option<String> },
    /// Validate and store a value
    Set { key: String, value: String },
}

impl Command {
    /// Per-request auto-approve override of `submit`
    pub fn approval_override(&self) -> Option<bool> {
        match self {
            Command::Submit {
                auto_approve: true,
                ..
            } => Some(true),
            Command::Submit {
                no_auto_approve: true,
                ..
            } => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_override_flags() {
        let cli = Cli::parse_from(["hq", "submit", "size up", "--auto-approve"]);
        assert_eq!(cli.command.approval_override(), Some(true));

        let cli = Cli::parse_from(["hq", "submit", "size up", "--no-auto-approve"]);
        assert_eq!(cli.command.approval_override(), Some(false));

        let cli = Cli::parse_from(["hq", "submit", "size up"]);
        assert_eq!(cli.command.approval_override(), None);
    }

    #[test]
    fn test_conflicting_override_flags_rejected() {
        let result = Cli::try_parse_from([
            "hq",
            "submit",
            "x",
            "--auto-approve",
            "--no-auto-approve",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_id_is_parsed() {
        let cli = Cli::parse_from([
            "hq",
            "-o",
            "json",
            "approve",
            "6f1c2a9e-8d3b-4a7c-9e21-0b5d4c3a2f10",
        ]);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Command::Approve { .. }));

        assert!(Cli::try_parse_from(["hq", "approve", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_rollback_and_config_set() {
        let cli = Cli::parse_from(["hq", "rollback", "momentum_trader", "3"]);
        match cli.command {
            Command::Rollback { agent_id, version } => {
                assert_eq!(agent_id.as_str(), "momentum_trader");
                assert_eq!(version, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["hq", "config", "set", "auto_approve", "on"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Set { .. }
            }
        ));
    }
}
