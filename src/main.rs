//! Lifecycle CLI entrypoint.
//!
//! This is the main entrypoint for the lifecycle command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use resource_lifecycle::cli::{Cli, Commands, OutputFormat, OutputFormatter};
use resource_lifecycle::config::{
    ConfigHasher, ConfigParser, ConfigValidator, ScenarioConfig, find_config_file,
};
use resource_lifecycle::error::{LifecycleError, Result};
use resource_lifecycle::orchestrator::{
    ChannelSink, EventSink, Orchestrator, RunReport, RunStage, TracingSink,
};
use resource_lifecycle::planner::Plan;
use resource_lifecycle::provider::{ProviderAdapter, build_provider};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: OutputFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.with_target(false).init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|()| ExitCode::SUCCESS),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan => cmd_plan(cli.config.as_ref(), &formatter).map(|()| ExitCode::SUCCESS),
        Commands::Run { report } => {
            cmd_run(cli.config.as_ref(), report.as_deref(), cli.output).await
        }
    }
}

/// Write a starter scenario.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new scenario in: {}", path.display());

    let config_path = path.join("lifecycle.yaml");
    let env_path = path.join(".env.example");

    if !force && config_path.exists() {
        eprintln!("Scenario file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/lifecycle.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    eprintln!("\nScenario initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Edit lifecycle.yaml with the resources to exercise");
    eprintln!("  2. Run 'lifecycle validate' to check the scenario");
    eprintln!("  3. Run 'lifecycle plan' to see creation and deletion order");
    eprintln!("  4. Run 'lifecycle run' to provision, update, and clean up");

    Ok(())
}

/// Validate the scenario.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating scenario: {}", config_file.display());

    let config = load_scenario(&config_file)?;
    let result = ConfigValidator::new().check(&config);

    eprintln!(
        "{}",
        formatter.format_validation(&config, &result, show_warnings)
    );

    if result.is_valid() {
        Plan::from_config(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Show the execution plan.
fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    let config = load_scenario(&config_file)?;
    ConfigValidator::new().validate(&config)?;

    let plan = Plan::from_config(&config)?;
    let hash = ConfigHasher::new().hash_scenario(&config);
    eprintln!("{}", formatter.format_plan(&plan, &hash));

    Ok(())
}

/// Run the scenario end to end.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    report_path: Option<&Path>,
    output: OutputFormat,
) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(output);
    let config_file = resolve_config_path(config_path)?;
    let config = load_scenario(&config_file)?;
    let validation = ConfigValidator::new().validate(&config)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let mut plan = Plan::from_config(&config)?;
    let hasher = ConfigHasher::new();
    info!(
        "Running {} with {} resources (scenario {})",
        config.qualified_name(),
        plan.len(),
        hasher.short_hash(&hasher.hash_scenario(&config))
    );

    let report = match build_provider(&config.provider) {
        Ok(provider) => {
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping at the next resource boundary");
                    interrupt.cancel();
                }
            });

            execute_with_events(&config, &mut plan, provider.as_ref(), cancel, output).await
        }
        Err(e) => {
            error!("Could not set up the {} provider: {e}", config.provider.provider_type);
            RunReport::unstarted(&plan, RunStage::Connect, &e)
        }
    };

    eprintln!("{}", formatter.format_report(&report));

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| LifecycleError::internal(format!("Failed to serialize report: {e}")))?;
        std::fs::write(path, json)?;
        debug!("Wrote run report to {}", path.display());
    }

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs the orchestrator, streaming events to the terminal.
///
/// With JSON output, events go to the structured log instead.
async fn execute_with_events(
    config: &ScenarioConfig,
    plan: &mut Plan,
    provider: &dyn ProviderAdapter,
    cancel: CancellationToken,
    output: OutputFormat,
) -> RunReport {
    if output == OutputFormat::Json {
        return orchestrate(config, plan, provider, &TracingSink, cancel).await;
    }

    let (channel, mut events) = ChannelSink::new();
    let formatter = OutputFormatter::new(output);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("{}", formatter.format_event(&event));
        }
    });

    let report = orchestrate(config, plan, provider, &channel, cancel).await;

    drop(channel);
    if let Err(e) = printer.await {
        debug!("Event printer stopped: {e}");
    }

    report
}

async fn orchestrate(
    config: &ScenarioConfig,
    plan: &mut Plan,
    provider: &dyn ProviderAdapter,
    sink: &dyn EventSink,
    cancel: CancellationToken,
) -> RunReport {
    Orchestrator::new(provider, sink)
        .with_cleanup_strategy(config.cleanup.strategy)
        .with_verification(config.verify)
        .with_cancellation(cancel)
        .run(plan, &config.updates)
        .await
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the scenario file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` next to the scenario, then the scenario with overrides.
fn load_scenario(config_file: &Path) -> Result<ScenarioConfig> {
    debug!("Loading scenario from: {}", config_file.display());

    let parser = ConfigParser::new()
        .with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;

    parser.load_with_env(config_file)
}
