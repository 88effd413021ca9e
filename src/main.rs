//! AuditCrew - multi-agent code review orchestrator
//!
//! Fans a code snippet out to specialist review agents over HTTP, waits
//! for every one of them, and merges their suggestions into a single
//! deduplicated report that is recorded in SQLite.
//!
//! Exit codes:
//!   0 - Success (server shut down cleanly, or analysis completed)
//!   1 - Runtime error (config, bind, store, consolidation failure, etc.)
//!   2 - An agent failed during --analyze with --fail-on-agent-error

mod agent;
mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod server;
mod store;
#[cfg(test)]
mod testing;

use agent::AgentRegistry;
use analysis::Orchestrator;
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{AgentName, CodeSnippet};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use store::{AnalysisStore, SqliteStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level(&args));

    info!("AuditCrew v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match source {
        ConfigSource::File(path) => info!("Loaded config from: {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Fallback(reason) => warn!("Failed to load config: {}", reason),
    }

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("AuditCrew failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .auditcrew.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set a url for each agent to enable it.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity settings when set.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the shared context and either serve or analyze once.
async fn run(args: Args, config: Config) -> Result<i32> {
    let orchestrator = build_orchestrator(&config).await?;

    match args.analyze {
        Some(_) => analyze_once(&args, &orchestrator).await,
        None => {
            server::run_server(orchestrator, &config.server.host, config.server.port).await?;
            info!("Server stopped");
            Ok(0)
        }
    }
}

/// Registry plus optional store, the explicit context every request shares.
async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let registry = AgentRegistry::from_config(&config.agents, &config.client)
        .context("Failed to build agent registry")?;

    if registry.enabled_count() == 0 {
        warn!(
            "No agents have an endpoint configured; every analysis will be empty. \
             Set <NAME>_AGENT_URL or an agent url in {}",
            DEFAULT_CONFIG_FILE
        );
    } else {
        info!(
            enabled = registry.enabled_count(),
            timeout_seconds = config.client.timeout_seconds,
            "Agent registry ready"
        );
    }

    let store: Option<Arc<dyn AnalysisStore>> = if config.store.enabled {
        let store = SqliteStore::connect(&config.store.database_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to open analysis store at {}",
                    config.store.database_url
                )
            })?;
        match store.count().await {
            Ok(n) => info!(records = n, "Analysis store opened"),
            Err(e) => warn!(error = %e, "Could not count stored analyses"),
        }
        Some(Arc::new(store) as Arc<dyn AnalysisStore>)
    } else {
        info!("Analysis recording disabled");
        None
    };

    Ok(Orchestrator::new(Arc::new(registry), store))
}

/// Handle --analyze: run one orchestration and write the report.
async fn analyze_once(args: &Args, orchestrator: &Orchestrator) -> Result<i32> {
    let snippet = read_snippet(args)?;
    let agents: Vec<AgentName> = orchestrator
        .registry()
        .lookup()
        .map(|(name, _)| name.clone())
        .collect();

    if !args.quiet {
        eprintln!("🔬 Sending snippet to {} agent(s)...", agents.len());
    }

    let orchestration = orchestrator
        .run(snippet.clone())
        .await
        .context("Failed to consolidate agent results")?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&orchestration.report)?,
        OutputFormat::Markdown => {
            let metadata = report::ReportMetadata::new(&snippet, agents, &orchestration);
            report::generate_markdown_report(&orchestration.report, &metadata)
        }
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    if !args.quiet {
        eprintln!(
            "📊 {} agent(s) consulted, {} suggestion(s), {} failed, {:.1}s",
            orchestration.dispatched,
            orchestration.report.suggestions.len(),
            orchestration.report.failures.len(),
            orchestration.duration_seconds
        );
    }

    if args.fail_on_agent_error && !orchestration.report.failures.is_empty() {
        eprintln!(
            "\n⛔ {} agent(s) failed. Failing (exit code 2).",
            orchestration.report.failures.len()
        );
        return Ok(2);
    }

    Ok(0)
}

fn read_snippet(args: &Args) -> Result<CodeSnippet> {
    let code = if args.analyze_stdin() {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read snippet from stdin")?;
        buffer
    } else {
        let path = args
            .analyze
            .as_deref()
            .context("No file to analyze")?;
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    Ok(CodeSnippet::from(code))
}

/// Where the effective configuration came from, logged once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Fallback(String),
}

/// Load configuration from file or use defaults, then apply the
/// environment and command line on top.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    let (mut config, source) = match args.config {
        Some(ref config_path) => (
            Config::load(config_path)?,
            ConfigSource::File(config_path.clone()),
        ),
        None => match Config::load_default() {
            Ok(Some(config)) => (config, ConfigSource::File(DEFAULT_CONFIG_FILE.into())),
            Ok(None) => (Config::default(), ConfigSource::Defaults),
            Err(e) => (Config::default(), ConfigSource::Fallback(format!("{:#}", e))),
        },
    };

    config.apply_env();
    config.merge_with_args(args);

    Ok((config, source))
}
