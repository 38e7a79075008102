use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::models::ProviderProfile;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigLoadError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigLoadError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenrouteConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Connection settings for the external usage store. An empty url keeps
/// counters in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_pool_min")]
    pub pool_min_connections: u32,

    #[serde(default = "default_pool_max")]
    pub pool_max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub pool_acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Delay before the first probe round after start.
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,

    /// Weight given to the newest sample in the EWMA updates.
    #[serde(default = "default_smoothing")]
    pub smoothing_factor: f64,
}

impl HealthConfig {
    /// Never shorter than one second.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum number of usage records kept in memory.
    #[serde(default = "default_ledger_capacity")]
    pub capacity: usize,

    #[serde(default = "default_persist_queue")]
    pub persist_queue_capacity: usize,

    /// Fraction of the monthly limit at which a warning is logged.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Monthly spend ceilings seeded into the usage store at start-up.
    #[serde(default)]
    pub monthly_limits: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency_limit: usize,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl DispatchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Optional replacement for the built-in capability registry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub providers: Vec<ProviderProfile>,

    #[serde(default)]
    pub chains: HashMap<String, Vec<String>>,
}

impl RegistryConfig {
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.chains.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// An HTTP generation endpoint that speaks the genroute JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub base_url: String,

    /// Name of the environment variable holding the bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

fn default_pool_min() -> u32 {
    1
}

fn default_pool_max() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_probe_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_startup_delay() -> u64 {
    5
}

fn default_smoothing() -> f64 {
    0.1
}

fn default_ledger_capacity() -> usize {
    1000
}

fn default_persist_queue() -> usize {
    256
}

fn default_warning_threshold() -> f64 {
    0.9
}

fn default_concurrency() -> usize {
    3
}

fn default_call_timeout() -> u64 {
    120
}

fn default_retry_backoff() -> u64 {
    2000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_min_connections: default_pool_min(),
            pool_max_connections: default_pool_max(),
            pool_acquire_timeout_secs: default_acquire_timeout(),
            pool_idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval_secs: default_probe_interval(),
            probe_timeout_secs: default_probe_timeout(),
            startup_delay_secs: default_startup_delay(),
            smoothing_factor: default_smoothing(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: default_ledger_capacity(),
            persist_queue_capacity: default_persist_queue(),
            warning_threshold: default_warning_threshold(),
            monthly_limits: HashMap::new(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency(),
            call_timeout_secs: default_call_timeout(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl GenrouteConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from_paths(get_config_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> Result<Self, ConfigLoadError> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("GENROUTE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let mut genroute_config: GenrouteConfig = config.try_deserialize().unwrap_or_else(|e| {
            warn!("Ignoring unreadable configuration, using defaults: {}", e);
            GenrouteConfig::default()
        });

        if let Ok(url) = std::env::var("DATABASE_URL") {
            genroute_config.database.url = url;
        }

        if let Ok(level) = std::env::var("GENROUTE_LOG_LEVEL") {
            genroute_config.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            genroute_config.logging.level = level;
        }

        genroute_config.validate()?;

        Ok(genroute_config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let url = &self.database.url;
        if !url.is_empty() && !url.starts_with("postgres://") && !url.starts_with("postgresql://")
        {
            return Err(ConfigLoadError::invalid(
                "database.url",
                "Must be empty or a PostgreSQL URL starting with postgres:// or postgresql://",
            ));
        }

        if self.database.pool_min_connections > self.database.pool_max_connections {
            return Err(ConfigLoadError::invalid(
                "database.pool_min_connections",
                "Cannot be greater than pool_max_connections",
            ));
        }

        if self.health.probe_interval_secs == 0 {
            return Err(ConfigLoadError::invalid(
                "health.probe_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.health.probe_timeout_secs == 0 {
            return Err(ConfigLoadError::invalid(
                "health.probe_timeout_secs",
                "Must be greater than 0",
            ));
        }

        let smoothing = self.health.smoothing_factor;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            return Err(ConfigLoadError::invalid(
                "health.smoothing_factor",
                format!("Must be in (0, 1], got {}", smoothing),
            ));
        }

        if self.ledger.capacity == 0 {
            return Err(ConfigLoadError::invalid(
                "ledger.capacity",
                "Must be greater than 0",
            ));
        }

        if self.ledger.persist_queue_capacity == 0 {
            return Err(ConfigLoadError::invalid(
                "ledger.persist_queue_capacity",
                "Must be greater than 0",
            ));
        }

        let threshold = self.ledger.warning_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigLoadError::invalid(
                "ledger.warning_threshold",
                format!("Must be in (0, 1], got {}", threshold),
            ));
        }

        if self.dispatch.call_timeout_secs == 0 {
            return Err(ConfigLoadError::invalid(
                "dispatch.call_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if !self.registry.providers.is_empty() {
            for (task, chain) in &self.registry.chains {
                if chain.is_empty() {
                    return Err(ConfigLoadError::invalid(
                        &format!("registry.chains.{}", task),
                        "Fallback chain must name at least one provider",
                    ));
                }
            }
        }

        for endpoint in &self.providers.endpoints {
            if endpoint.name.is_empty() || endpoint.base_url.is_empty() {
                return Err(ConfigLoadError::MissingRequired(
                    "providers.endpoints.name / base_url".to_string(),
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(ConfigLoadError::invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            ));
        }

        Ok(())
    }

    pub fn uses_database(&self) -> bool {
        !self.database.url.is_empty()
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("genroute.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".genroute").join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut env_paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        env_paths.push(cwd.join(".env"));
        env_paths.push(cwd.join(".env.local"));
    }

    if let Some(home) = dirs::home_dir() {
        env_paths.push(home.join(".genroute").join(".env"));
    }

    for path in env_paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("genroute"))
}
