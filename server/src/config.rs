//! Layered configuration for the governance server: built-in defaults,
//! an optional config file, then environment overrides, the same layer
//! order the teacher's `mcp-server` uses (`config` crate + `GOV_`-
//! prefixed env vars), generalized with the scheduler cadences and PR
//! integrity settings this binary additionally needs.

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub pr_integrity: PrIntegrityConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Optional database URL. If not provided, defaults to ~/gov.sqlite
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub port: u16,
    pub workers: usize,
    /// Require a bearer token on every request (§6). Off by default for
    /// local development, the same posture the teacher's auth module
    /// defaults to.
    pub auth_enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Wall-clock cadence (in seconds) for each watchdog tick (§4.3). The
/// scheduler runs a `tokio::time::interval` per field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    pub idle_nudge_seconds: u64,
    pub cadence_watchdog_seconds: u64,
    pub mention_rescue_seconds: u64,
    pub board_health_seconds: u64,
    pub execution_sweeper_seconds: u64,
    pub webhook_retry_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrIntegrityConfig {
    /// Base URL for the PR-integrity HTTP lookup (GitHub's REST API by
    /// default; overridable for GitHub Enterprise or a test double).
    pub api_base_url: String,
    /// Optional bearer token for the PR-integrity provider.
    pub api_token: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables, optionally
    /// layered over a config file.
    pub fn from_env() -> Result<Self> {
        Self::build(None)
    }

    /// Load configuration from a specific file path, with env overrides
    /// still applied on top.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::build(Some(path))
    }

    fn build(file_path: Option<&str>) -> Result<Self> {
        let defaults = Config::default();
        let defaults_toml = toml::to_string(&defaults).context("failed to serialize default configuration")?;

        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(&defaults_toml, FileFormat::Toml));

        if let Some(path) = file_path {
            builder = builder.add_source(File::with_name(path).required(false).format(FileFormat::Toml));
        } else if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::with_prefix("GOV").separator("_").try_parsing(true));

        let built = builder.build().context("failed to build configuration")?;
        let mut result: Config = built.try_deserialize().context("failed to deserialize configuration")?;

        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Standard, unprefixed environment variables kept for deployment
    /// compatibility alongside the `GOV_`-prefixed ones above.
    fn apply_standard_env_vars(config: &mut Config) {
        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database.url = Some(database_url);
        }
        if let Ok(listen_addr) = env::var("LISTEN_ADDR") {
            config.server.listen_addr = listen_addr;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }

    pub fn database_url(&self) -> String {
        match &self.database.url {
            Some(url) => url.clone(),
            None => Self::default_database_url(),
        }
    }

    pub fn default_database_url() -> String {
        if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
            return format!("sqlite://{xdg_data}/gov-server/gov.sqlite");
        }
        let home = env::var("HOME").or_else(|_| env::var("USERPROFILE")).unwrap_or_else(|_| ".".to_string());
        format!("sqlite://{home}/gov.sqlite")
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        let database_url = self.database_url();
        if !database_url.starts_with("sqlite://") {
            return Err(anyhow::anyhow!(
                "Only SQLite databases are supported. URL must start with 'sqlite://'. Got: {}",
                database_url
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }
        if self.server.workers == 0 {
            return Err(anyhow::anyhow!("Server workers must be greater than 0"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Database max_connections must be greater than 0"));
        }

        for (name, seconds) in [
            ("idle_nudge_seconds", self.scheduler.idle_nudge_seconds),
            ("cadence_watchdog_seconds", self.scheduler.cadence_watchdog_seconds),
            ("mention_rescue_seconds", self.scheduler.mention_rescue_seconds),
            ("board_health_seconds", self.scheduler.board_health_seconds),
            ("execution_sweeper_seconds", self.scheduler.execution_sweeper_seconds),
            ("webhook_retry_seconds", self.scheduler.webhook_retry_seconds),
        ] {
            if seconds == 0 {
                return Err(anyhow::anyhow!("scheduler.{name} must be greater than 0"));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { url: None, max_connections: 5, connection_timeout: 30 },
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                port: 3000,
                workers: 4,
                auth_enabled: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
            scheduler: SchedulerConfig {
                idle_nudge_seconds: 60,
                cadence_watchdog_seconds: 300,
                mention_rescue_seconds: 60,
                board_health_seconds: 300,
                execution_sweeper_seconds: 120,
                webhook_retry_seconds: 30,
            },
            pr_integrity: PrIntegrityConfig {
                api_base_url: "https://api.github.com".to_string(),
                api_token: None,
                request_timeout_seconds: 10,
            },
        }
    }
}

#[allow(dead_code)]
pub fn default_database_path() -> PathBuf {
    let home = env::var("HOME").or_else(|_| env::var("USERPROFILE")).unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join("gov.sqlite")
}
