//! Configuration file handling.
//!
//! This module handles loading `.auditcrew.toml`, applying environment
//! overrides, and merging command-line arguments on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".auditcrew.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Agent client settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Specialist agents, in dispatch order.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            store: StoreConfig::default(),
            agents: default_agents(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Agent client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deadline for a single agent call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    90
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Record analyses at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// sqlx connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: default_database_url(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_database_url() -> String {
    "sqlite://auditcrew.db".to_string()
}

/// One specialist agent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Logical agent name.
    pub name: String,

    /// Analyze endpoint. Absent means the agent is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-agent deadline override, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl AgentConfig {
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            timeout_seconds: None,
        }
    }

    /// Environment variable that overrides this agent's URL.
    pub fn env_key(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_AGENT_URL", name)
    }
}

fn default_agents() -> Vec<AgentConfig> {
    ["security", "performance", "codestyle"]
        .into_iter()
        .map(AgentConfig::disabled)
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// `<NAME>_AGENT_URL` sets an agent's endpoint (empty disables it) and
    /// `AUDITCREW_DATABASE_URL` sets the store URL.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for agent in &mut self.agents {
            if let Some(value) = lookup(&agent.env_key()) {
                let value = value.trim();
                agent.url = (!value.is_empty()).then(|| value.to_string());
            }
        }

        if let Some(url) = lookup("AUDITCREW_DATABASE_URL") {
            if !url.trim().is_empty() {
                self.store.database_url = url.trim().to_string();
            }
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file and environment settings.
    /// Only explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(timeout) = args.timeout {
            self.client.timeout_seconds = timeout;
        }
        if let Some(ref url) = args.database_url {
            self.store.database_url = url.clone();
        }
        if args.no_persist {
            self.store.enabled = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Effective log level. `--quiet` wins; `[general] verbose` raises the
    /// default to DEBUG like `--verbose` does.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if args.quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
