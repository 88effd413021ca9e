//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// AuditCrew - consolidated code review from specialist agents
///
/// Sends a code snippet to every configured review agent (security,
/// performance, style, ...) in parallel, merges their suggestions into
/// one deduplicated report and records it.
///
/// Examples:
///   auditcrew                                   # serve POST /orchestrate-analysis
///   auditcrew --port 9000 --config crew.toml
///   auditcrew --analyze snippet.py --format json
///   cat snippet.py | auditcrew --analyze - --no-persist
///   auditcrew --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .auditcrew.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, value_name = "HOST", env = "AUDITCREW_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(short, long, value_name = "PORT", env = "AUDITCREW_PORT")]
    pub port: Option<u16>,

    /// Per-agent request timeout in seconds
    ///
    /// Each agent call gets its own deadline. Default: from config or 90s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Database URL for recording analyses
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Do not record analyses
    #[arg(long)]
    pub no_persist: bool,

    /// Analyze a single file and exit instead of serving
    ///
    /// Use "-" to read the snippet from stdin.
    #[arg(short, long, value_name = "FILE")]
    pub analyze: Option<PathBuf>,

    /// Output file for --analyze (defaults to stdout)
    #[arg(short, long, value_name = "FILE", requires = "analyze")]
    pub output: Option<PathBuf>,

    /// Output format for --analyze (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Exit with code 2 if any agent failed during --analyze
    #[arg(long, requires = "analyze")]
    pub fail_on_agent_error: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .auditcrew.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref url) = self.database_url {
            if !url.starts_with("sqlite:") {
                return Err("Database URL must start with 'sqlite:'".to_string());
            }
        }

        if let Some(ref path) = self.analyze {
            if path.as_os_str() != "-" && !path.is_file() {
                return Err(format!("File to analyze does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Whether the snippet should be read from stdin.
    pub fn analyze_stdin(&self) -> bool {
        self.analyze.as_deref().is_some_and(|p| p.as_os_str() == "-")
    }
}
