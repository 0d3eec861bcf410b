//! CLI entrypoint for concord
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;
mod output;
mod progress;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, OutputFormat};
use concord_application::{
    LedgerStore, NoRunEventLogger, Orchestrator, PromptedAgentCaller, ProviderRegistry,
    RunEventLogger,
};
use concord_domain::{
    ContextMap, GovernanceEngine, PolicyRuleChecker, PromptCompiler, PromptContext,
    PromptIRPipeline,
};
use concord_infrastructure::{
    ConfigError, ConfigLoader, EchoProvider, JsonlLedgerStore, JsonlRunEventLogger,
};
use output::ConsoleFormatter;
use progress::ProgressReporter;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
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
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.show_config {
        println!("Configuration sources (in priority order):");
        println!("  [env  ] {}*", concord_infrastructure::config::ENV_PREFIX);
        for (label, path, found) in ConfigLoader::config_sources(cli.config.as_deref()) {
            let mark = if found { "FOUND" } else { "     " };
            println!("  [{}] {:<8} {}", mark, format!("{}:", label), path.display());
        }
        println!("  [     ] Default: built-in defaults");
        return Ok(());
    }

    let Some(task) = cli.task.clone() else {
        bail!("A task is required. Run with --help for usage.");
    };

    info!("Starting concord");

    // === Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    let (mut settings, issues) = file_config.resolve();
    let (errors, warnings): (Vec<_>, Vec<_>) = issues.into_iter().partition(|i| i.is_error());
    for issue in &warnings {
        warn!("{}", issue);
    }
    if !errors.is_empty() {
        return Err(ConfigError::Invalid(errors).into());
    }

    if let Some(max) = cli.max_phases {
        settings.orchestrator = settings.orchestrator.with_max_phases(max);
    }
    if cli.sequential {
        settings.orchestrator = settings.orchestrator.with_parallel(false);
    }
    if cli.provider.is_some() {
        settings.default_provider = cli.provider.clone();
    }

    // === Dependency Injection ===
    let events: Arc<dyn RunEventLogger> = match cli
        .events_out
        .as_ref()
        .or(settings.logging.events_path.as_ref())
        .and_then(JsonlRunEventLogger::new)
    {
        Some(logger) => Arc::new(logger),
        None => Arc::new(NoRunEventLogger),
    };

    let mut providers = ProviderRegistry::new().register(Arc::new(EchoProvider::new()));
    if let Some(name) = &settings.default_provider {
        if providers.get(name).is_err() {
            bail!(
                "Unknown provider '{}'. Available: {}",
                name,
                providers.names().collect::<Vec<_>>().join(", ")
            );
        }
        providers = providers.with_default(name.clone());
    }

    let mut pipeline = PromptIRPipeline::standard(settings.digest_threshold);
    if !settings.policies.is_empty() {
        pipeline = pipeline.with_governance(PolicyRuleChecker::new(settings.policies.clone()));
    }
    let compiler = PromptCompiler::new(settings.compiler, settings.templates.clone());

    let mut base_context = PromptContext::new();
    for path in &cli.context_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {}", path.display()))?;
        base_context = base_context.with_file(path.display().to_string(), content);
    }

    let caller = PromptedAgentCaller::new(Arc::new(pipeline), Arc::new(compiler), providers)
        .with_profiles(settings.profiles.clone())
        .with_base_context(base_context)
        .with_event_logger(events.clone());

    let mut orchestrator = Orchestrator::new(Arc::new(caller), settings.orchestrator.clone())
        .with_event_logger(events);
    if settings.governance_enabled {
        orchestrator = orchestrator.with_governance(Arc::new(GovernanceEngine::new()));
    }

    let mut context = ContextMap::new();
    if !cli.constraint.is_empty() {
        context.insert("constraints".to_string(), json!(cli.constraint));
    }

    // === Run ===
    let ledger = if cli.quiet || matches!(cli.output, OutputFormat::Json) {
        orchestrator.run(&task, context).await
    } else {
        let progress = ProgressReporter::new();
        orchestrator.run_with_progress(&task, context, &progress).await
    };

    if let Some(path) = cli.ledger_out.as_ref().or(settings.logging.ledger_path.as_ref()) {
        JsonlLedgerStore::new(path)
            .append(&ledger)
            .with_context(|| format!("Failed to store ledger in {}", path.display()))?;
        info!("Ledger {} appended to {}", ledger.run_id, path.display());
    }

    let output = match cli.output {
        OutputFormat::Full => ConsoleFormatter::format(&ledger),
        OutputFormat::Final => ConsoleFormatter::format_final(&ledger),
        OutputFormat::Json => ConsoleFormatter::format_json(&ledger),
    };
    println!("{}", output);

    if !ledger.is_success() {
        bail!("Run {} ended in state {}", ledger.run_id, ledger.state.as_str());
    }

    Ok(())
}
