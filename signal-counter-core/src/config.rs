//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/signal-counter/config.toml`
//! unless a path is given explicitly. Every field has a default except the
//! collector endpoint, which must come from the file or the command line.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/signal-counter/` (~/.config/signal-counter/)
//! - State/Logs: `$XDG_STATE_HOME/signal-counter/` (~/.local/state/signal-counter/)

use crate::error::{Error, Result};
use crate::types::TimestampUnit;
use serde::Deserialize;
use std::path::{Path, PathBuf};

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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Input line and debounce settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Queue slot locations
    #[serde(default)]
    pub queue: QueueConfig,

    /// Remote collector settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GPIO and edge qualification settings
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Input pin (sysfs GPIO number)
    #[serde(default)]
    pub input_pin: u32,

    /// Activity LED pin
    #[serde(default = "default_led_pin")]
    pub led_pin: u32,

    /// Blink the LED when a signal is recorded
    #[serde(default = "default_true")]
    pub activity_led: bool,

    /// Minimum rising-to-falling dwell that counts as a signal
    #[serde(default = "default_trigger_interval_ms")]
    pub trigger_interval_ms: u64,

    /// Resolution of timestamps written to the queue
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,

    /// Root of the sysfs GPIO tree
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,

    /// How often the input line is sampled
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input_pin: 0,
            led_pin: default_led_pin(),
            activity_led: true,
            trigger_interval_ms: default_trigger_interval_ms(),
            timestamp_unit: TimestampUnit::default(),
            gpio_root: default_gpio_root(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_led_pin() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_trigger_interval_ms() -> u64 {
    300
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_poll_interval_ms() -> u64 {
    2
}

/// Queue slot locations
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// File receiving new events
    #[serde(default = "default_active_path")]
    pub active_path: PathBuf,

    /// Snapshot currently being delivered
    #[serde(default = "default_pending_path")]
    pub pending_path: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            active_path: default_active_path(),
            pending_path: default_pending_path(),
        }
    }
}

fn default_active_path() -> PathBuf {
    PathBuf::from("/var/lib/signalCounter/count")
}

fn default_pending_path() -> PathBuf {
    std::env::temp_dir().join("signalCounterCount.swp")
}

/// Remote collector configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Collector URL receiving the form POST
    pub endpoint_url: Option<String>,

    /// Milliseconds between delivery cycles
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// File holding the device identifier
    #[serde(default = "default_identity_path")]
    pub identity_path: PathBuf,

    /// Fixed device identifier, overriding `identity_path`
    pub device_id: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            period_ms: default_period_ms(),
            timeout_secs: default_timeout_secs(),
            identity_path: default_identity_path(),
            device_id: None,
        }
    }
}

fn default_period_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_identity_path() -> PathBuf {
    PathBuf::from("/sys/class/net/eth0/address")
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Check that the configuration can drive the daemon.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint_url()?;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "delivery.endpoint_url must be an http(s) URL, got {:?}",
                endpoint
            )));
        }
        if self.capture.trigger_interval_ms == 0 {
            return Err(Error::Config(
                "capture.trigger_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(Error::Config(
                "capture.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.delivery.period_ms == 0 {
            return Err(Error::Config(
                "delivery.period_ms must be greater than 0".to_string(),
            ));
        }
        if self.queue.active_path == self.queue.pending_path {
            return Err(Error::Config(
                "queue.active_path and queue.pending_path must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured collector endpoint, or a configuration error.
    pub fn endpoint_url(&self) -> Result<&str> {
        self.delivery
            .endpoint_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::Config("delivery.endpoint_url is required".to_string()))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/signal-counter/config.toml` (~/.config/signal-counter/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("signal-counter").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/signal-counter/` (~/.local/state/signal-counter/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("signal-counter")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("signal-counter.log")
    }
}
