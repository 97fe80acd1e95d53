//! CLI entrypoint for hq
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use hq_application::{
    CommandPipeline, HierarchyRepository, HierarchyService, NoProgress, OrderRepository,
    SeedHierarchyUseCase, StageObserver, SubmitCommandInput,
};
use hq_domain::config::known_keys;
use hq_domain::{
    FALLBACK_MODEL, Model, OperatorCommand, OrderResult, OrderStatus, normalize_value,
};
use hq_infrastructure::{
    ConfigLoader, FallbackGateway, FileConfig, FileOutputFormat, InMemoryStore,
    JsonlConversationLogger, OpenAiCompatibleGateway, SeedFile, SqliteStore, StorageBackend,
};
use hq_presentation::{
    Cli, Command, ConfigAction, ConsoleFormatter, OutputFormat, ProgressReporter,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Gateway = FallbackGateway<OpenAiCompatibleGateway>;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("Starting hq");

    // === Load Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };
    if !file_config.output.color {
        colored::control::set_override(false);
    }

    let format = cli
        .output
        .or(file_config.output.format.map(|format| match format {
            FileOutputFormat::Full => OutputFormat::Full,
            FileOutputFormat::Json => OutputFormat::Json,
        }))
        .unwrap_or(OutputFormat::Full);

    if let Command::ShowConfig = cli.command {
        show_config(&file_config, cli.no_config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let pipeline_config = file_config
        .to_pipeline_config()
        .context("Invalid configuration")?;

    // === Dependency Injection ===
    let (hierarchy_repo, order_repo) = open_stores(&file_config)?;
    let hierarchy = Arc::new(HierarchyService::new(hierarchy_repo));

    let fallback = match hierarchy.config_value(FALLBACK_MODEL)? {
        Some(value) => {
            let Ok(model) = value.parse::<Model>();
            model
        }
        None => pipeline_config.fallback_model.clone(),
    };
    let inner = OpenAiCompatibleGateway::new(
        file_config.provider.base_url.clone(),
        file_config.provider.api_key(),
    )?;
    let gateway = Arc::new(FallbackGateway::new(
        inner,
        fallback,
        pipeline_config.call_timeout,
    ));

    let mut pipeline = CommandPipeline::new(
        gateway,
        Arc::clone(&hierarchy),
        order_repo,
        pipeline_config,
    );
    if let Some(path) = &file_config.logging.transcript {
        match JsonlConversationLogger::open(path) {
            Some(logger) => {
                info!("Writing transcript to {}", logger.path().display());
                pipeline = pipeline.with_conversation_logger(Arc::new(logger));
            }
            None => warn!("Transcript disabled: could not open {}", path.display()),
        }
    }

    let app = App {
        pipeline,
        hierarchy,
        format,
        quiet: cli.quiet,
    };
    let approval_override = cli.command.approval_override();

    match cli.command {
        Command::Submit { command, .. } => {
            if file_config.provider.api_key().is_none() {
                warn!(
                    "{} is not set; requests will be sent without an API key",
                    file_config.provider.api_key_env
                );
            }
            app.submit(command, approval_override).await
        }
        Command::Approve { order_id } => {
            let result = if app.quiet {
                app.pipeline.apply_pending_changes(&order_id, &NoProgress)?
            } else {
                let progress = ProgressReporter::new();
                app.pipeline.apply_pending_changes(&order_id, &progress)?
            };
            Ok(app.print_order_result(&result))
        }
        Command::Reject { order_id } => {
            let order = app.pipeline.reject_order(&order_id)?;
            app.print(&order, || format!("Order {} rejected\n", order.id));
            Ok(ExitCode::SUCCESS)
        }
        Command::Orders { limit } => {
            let orders = app.pipeline.recent_orders(limit)?;
            app.print(&orders, || ConsoleFormatter::format_orders(&orders));
            Ok(ExitCode::SUCCESS)
        }
        Command::Agents { all } => {
            let agents: Vec<_> = app
                .hierarchy
                .agents()?
                .into_iter()
                .filter(|agent| all || agent.active)
                .collect();
            app.print(&agents, || ConsoleFormatter::format_agents(&agents));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { agent_id } => {
            let Some(agent) = app.hierarchy.agent(&agent_id)? else {
                bail!("Agent not found: {}", agent_id);
            };
            app.print(&agent, || ConsoleFormatter::format_agent(&agent));
            Ok(ExitCode::SUCCESS)
        }
        Command::Versions { agent_id } => {
            let versions = app.hierarchy.prompt_versions(&agent_id)?;
            if versions.is_empty() && app.hierarchy.agent(&agent_id)?.is_none() {
                bail!("Agent not found: {}", agent_id);
            }
            app.print(&versions, || ConsoleFormatter::format_versions(&versions));
            Ok(ExitCode::SUCCESS)
        }
        Command::Rollback { agent_id, version } => {
            let activated = app.hierarchy.activate_prompt_version(&agent_id, version)?;
            app.print(&activated, || {
                format!("{} now on version {}\n", activated.agent_id, activated.version)
            });
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync => {
            let report = app.hierarchy.sync_chain_of_command()?;
            app.print(&report, || ConsoleFormatter::format_sync(&report));
            Ok(ExitCode::SUCCESS)
        }
        Command::Seed { file } => {
            let seed = match &file {
                Some(path) => SeedFile::load(path)?,
                None => SeedFile::builtin()?,
            };
            let report = SeedHierarchyUseCase::new(Arc::clone(&app.hierarchy))
                .execute(seed.into_input()?)?;
            app.print(&report, || ConsoleFormatter::format_seed_report(&report));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { action } => {
            app.config(action)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ShowConfig => Ok(ExitCode::SUCCESS),
    }
}

struct App {
    pipeline: CommandPipeline<Gateway>,
    hierarchy: Arc<HierarchyService>,
    format: OutputFormat,
    quiet: bool,
}

impl App {
    async fn submit(&self, command: String, approval_override: Option<bool>) -> Result<ExitCode> {
        let mut input = SubmitCommandInput::new(OperatorCommand::new(command)?);
        if let Some(auto_approve) = approval_override {
            input = input.with_auto_approve(auto_approve);
        }

        let cancellation = CancellationToken::new();
        let interrupt = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, aborting order");
                interrupt.cancel();
            }
        });

        let progress: Box<dyn StageObserver> = if self.quiet {
            Box::new(NoProgress)
        } else {
            Box::new(ProgressReporter::new())
        };
        let result = self
            .pipeline
            .submit_command(input, progress.as_ref(), &cancellation)
            .await;
        Ok(self.print_order_result(&result))
    }

    fn print_order_result(&self, result: &OrderResult) -> ExitCode {
        self.print(result, || ConsoleFormatter::format_order_result(result));
        if result.status() == OrderStatus::Rejected {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }


    fn config(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Get { key: Some(key) } => {
                let value = self.hierarchy.config_value(&key)?;
                self.print_value(&key, value.as_deref());
            }
            ConfigAction::Get { key: None } => {
                let values = self.hierarchy.config_values()?;
                let map: BTreeMap<&str, &str> = values
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                self.print(&map, || {
                    let mut output = ConsoleFormatter::format_config(&values);
                    let unset: Vec<&str> = known_keys()
                        .iter()
                        .map(|info| info.key)
                        .filter(|key| values.iter().all(|(k, _)| k != key))
                        .collect();
                    if !unset.is_empty() {
                        output.push_str(&format!("(unset: {})\n", unset.join(", ")));
                    }
                    output
                });
            }
            ConfigAction::Set { key, value } => {
                let value = normalize_value(&key, &value)?;
                self.hierarchy.set_config_value(&key, &value)?;
                info!("Config {} set to {}", key, value);
                self.print_value(&key, Some(&value));
            }
        }
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, full: impl FnOnce() -> String) {
        match self.format {
            OutputFormat::Full => print!("{}", full()),
            OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(value)),
        }
    }

    fn print_value(&self, key: &str, value: Option<&str>) {
        let map = BTreeMap::from([(key, value)]);
        self.print(&map, || match value {
            Some(value) => format!("{} = {}\n", key, value),
            None => format!("{} is not set\n", key),
        });
    }
}

fn open_stores(
    config: &FileConfig,
) -> Result<(Arc<dyn HierarchyRepository>, Arc<dyn OrderRepository>)> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; nothing will persist after exit");
            let store = Arc::new(InMemoryStore::new());
            let hierarchy: Arc<dyn HierarchyRepository> = store.clone();
            let orders: Arc<dyn OrderRepository> = store;
            Ok((hierarchy, orders))
        }
        StorageBackend::Sqlite => {
            let path = config.storage.resolved_path();
            let store = Arc::new(
                SqliteStore::open(&path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?,
            );
            info!("Using database {}", path.display());
            let hierarchy: Arc<dyn HierarchyRepository> = store.clone();
            let orders: Arc<dyn OrderRepository> = store;
            Ok((hierarchy, orders))
        }
    }
}

fn show_config(config: &FileConfig, no_config: bool) -> Result<()> {
    println!("Configuration sources:");
    if no_config {
        println!("  (disabled by --no-config)");
    } else {
        for (source, found) in ConfigLoader::config_sources() {
            let mark = if found { "found" } else { "not found" };
            println!("  {} ({})", source, mark);
        }
    }
    println!();
    println!("Effective configuration:");
    print!(
        "{}",
        toml::to_string_pretty(config).context("Failed to render configuration")?
    );
    Ok(())
}
