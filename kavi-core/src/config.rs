//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/kavi/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/kavi/` (~/.config/kavi/)
//! - Data: `$XDG_DATA_HOME/kavi/` (~/.local/share/kavi/)
//! - State/Logs: `$XDG_STATE_HOME/kavi/` (~/.local/state/kavi/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Assistant identity and response randomness
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Short-term conversation memory
    #[serde(default)]
    pub context: ContextConfig,

    /// Unsolicited message scheduling
    #[serde(default)]
    pub proactive: ProactiveConfig,

    /// Security scan options
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Assistant identity configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// Package id the assistant itself is installed under
    #[serde(default = "default_self_package")]
    pub self_package: String,

    /// Fixed seed for canned-response selection (random when unset)
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            self_package: default_self_package(),
            rng_seed: None,
        }
    }
}

fn default_self_package() -> String {
    "com.kavi.mobile".to_string()
}

/// Conversation memory configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// Number of turns kept before the oldest is evicted
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Seconds after the last turn during which memory is applied
    #[serde(default = "default_context_timeout")]
    pub timeout_secs: u64,

    /// Persisted commands replayed into memory at startup
    #[serde(default = "default_history_replay")]
    pub history_replay: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            timeout_secs: default_context_timeout(),
            history_replay: default_history_replay(),
        }
    }
}

impl ContextConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_turns() -> usize {
    10
}

fn default_context_timeout() -> u64 {
    5 * 60
}

fn default_history_replay() -> usize {
    5
}

/// Proactive trigger configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProactiveConfig {
    /// Start the proactive monitor alongside the interactive loop
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between trigger evaluations
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Minimum seconds between two proactive messages
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_secs: default_tick_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl ProactiveConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.tick_secs == 0 {
            return Err(Error::Config(
                "proactive.tick_secs must be greater than zero".to_string(),
            ));
        }
        if self.tick_secs >= self.cooldown_secs {
            return Err(Error::Config(
                "proactive.tick_secs must be shorter than proactive.cooldown_secs".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_tick_secs() -> u64 {
    15 * 60
}

fn default_cooldown_secs() -> u64 {
    30 * 60
}

/// Security scan configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecurityConfig {
    /// Also run the unsafe-setting and persistent-service detectors
    #[serde(default)]
    pub extended_checks: bool,

    /// Extra package names never reported as findings
    #[serde(default)]
    pub whitelist: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.proactive.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/kavi/config.toml` (~/.config/kavi/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("kavi").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("kavi")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("kavi")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/kavi/kavi.db` (~/.local/share/kavi/kavi.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("kavi.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("kavi.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// CLI binaries call this before touching any other component so paths
    /// stay stable for the whole process.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
