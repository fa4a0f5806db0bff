//! Configuration loading and typed config structures.
//!
//! Configuration is layered with the [`config`] crate:
//!
//! 1. `burrow-config.yaml` (or the file named by `BURROW_CONFIG`), optional
//! 2. Environment variables prefixed `BURROW__`, nested with `__`
//!    (e.g. `BURROW__SCHEDULER__UPDATE_INTERVAL_MS=30000`)
//! 3. `DATABASE_URL`, which overrides `database.url`
//!
//! Every field has a default, so an empty file (or no file) yields a
//! runnable configuration backed by the in-memory store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::lifecycle::EvictionPolicy;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "burrow-config.yaml";

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "BURROW";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized.
    #[error("failed to load config: {source}")]
    Load {
        /// The underlying loader error.
        #[from]
        source: config::ConfigError,
    },

    /// A value was read but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BurrowConfig {
    /// Lifecycle cadence and growth parameters.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Startup behaviour.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Report output.
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Record store connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BurrowConfig {
    /// Load configuration from an optional YAML file plus environment
    /// overrides, then validate it.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        config.database.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `BURROW_CONFIG`, falling back to
    /// [`DEFAULT_CONFIG_FILE`].
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var("BURROW_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        Self::load(&path)
    }

    /// Parse configuration from a YAML string, without environment
    /// overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot drive the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.update_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.update_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.scheduler.report_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.report_interval_ms must be at least 1".to_owned(),
            });
        }
        let rate = self.scheduler.depth_increment_rate;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("scheduler.depth_increment_rate must be finite and >= 0, got {rate}"),
            });
        }
        Ok(())
    }
}

/// Lifecycle cadence and growth parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchedulerConfig {
    /// Length of one update cycle in milliseconds.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Time between statistics reports in milliseconds.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    /// Age in cycles at which a burrow is evicted.
    #[serde(default = "default_max_burrow_age")]
    pub max_burrow_age: u64,

    /// Depth added per cycle to an occupied burrow, in meters.
    #[serde(default = "default_depth_increment_rate")]
    pub depth_increment_rate: f64,

    /// Which age is compared against `max_burrow_age`.
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,
}

impl SchedulerConfig {
    /// Update cadence as a [`Duration`].
    pub const fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Report cadence as a [`Duration`].
    pub const fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            max_burrow_age: default_max_burrow_age(),
            depth_increment_rate: default_depth_increment_rate(),
            eviction_policy: EvictionPolicy::default(),
        }
    }
}

/// Startup behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapConfig {
    /// JSON file holding the initial burrow set, loaded when the store is
    /// empty at startup.
    #[serde(default = "default_seed_file")]
    pub seed_file: PathBuf,

    /// Delete every record before bootstrapping. Intended for demos and
    /// local resets.
    #[serde(default)]
    pub reset_on_start: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            seed_file: default_seed_file(),
            reset_on_start: false,
        }
    }
}

/// Report output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportsConfig {
    /// Directory receiving `burrow_report_*.txt` files.
    #[serde(default = "default_reports_directory")]
    pub directory: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            directory: default_reports_directory(),
        }
    }
}

/// Record store connection.
///
/// Without a URL the engine runs against the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Override the URL with `DATABASE_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.url = Some(val);
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_update_interval_ms() -> u64 {
    60_000
}

const fn default_report_interval_ms() -> u64 {
    3_600_000
}

/// 25 days of one-minute cycles.
const fn default_max_burrow_age() -> u64 {
    36_000
}

const fn default_depth_increment_rate() -> f64 {
    0.009
}

fn default_seed_file() -> PathBuf {
    PathBuf::from("data/initial.json")
}

fn default_reports_directory() -> PathBuf {
    PathBuf::from("reports")
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
