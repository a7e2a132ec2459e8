//! Configuration management for crashrecorder.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. All
//! settings are static for the lifetime of the process.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sample::Signal;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "crashrecorder";

/// Default snapshot file name.
const SNAPSHOT_FILE_NAME: &str = "vehicle_data.csv";

/// Environment variable prefix.
const ENV_PREFIX: &str = "CRASHRECORDER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CRASHRECORDER_`, sections split on `__`)
/// 2. TOML config file at `~/.config/crashrecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling configuration.
    pub sampler: SamplerConfig,
    /// Event bus channel names.
    pub channels: ChannelConfig,
    /// Signal bus paths of the tracked signals.
    pub signals: SignalPaths,
    /// Snapshot file configuration.
    pub output: OutputConfig,
    /// Trigger handling policy.
    pub trigger: TriggerConfig,
}

/// Sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Interval between samples in milliseconds.
    pub period_ms: u64,
    /// Number of samples retained in the ring buffer.
    pub capacity: usize,
}

/// Event bus channel names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel the crash trigger arrives on.
    pub trigger: String,
    /// Channel acknowledgments are published on.
    pub response: String,
}

/// Signal bus paths, one per tracked signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalPaths {
    /// Obstacle warning flag.
    pub obstacle_warning: String,
    /// Longitudinal acceleration.
    pub longitudinal_acceleration: String,
    /// Vehicle speed.
    pub speed: String,
    /// Engine displacement.
    pub displacement: String,
}

/// Snapshot file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the snapshot file, overwritten on every dump.
    pub path: PathBuf,
}

/// Trigger handling policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Send a failure acknowledgment when the snapshot can't be written.
    pub ack_on_failure: bool,
    /// Send a success acknowledgment for triggers that don't request a dump.
    pub ack_on_noop: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            capacity: 300,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            trigger: "crashdetect/crashed".to_string(),
            response: "crashdetect/crashed/response".to_string(),
        }
    }
}

impl Default for SignalPaths {
    fn default() -> Self {
        Self {
            obstacle_warning: Signal::ObstacleWarning.default_path().to_string(),
            longitudinal_acceleration: Signal::LongitudinalAcceleration
                .default_path()
                .to_string(),
            speed: Signal::Speed.default_path().to_string(),
            displacement: Signal::Displacement.default_path().to_string(),
        }
    }
}

impl SignalPaths {
    /// Get the bus path configured for `signal`.
    #[must_use]
    pub fn path(&self, signal: Signal) -> &str {
        match signal {
            Signal::ObstacleWarning => &self.obstacle_warning,
            Signal::LongitudinalAcceleration => &self.longitudinal_acceleration,
            Signal::Speed => &self.speed,
            Signal::Displacement => &self.displacement,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(SNAPSHOT_FILE_NAME),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            ack_on_failure: true,
            ack_on_noop: false,
        }
    }
}

impl Config {
    /// Load configuration, reading the TOML file at `config_path` or the
    /// default location.
    ///
    /// Sources are merged in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if it exists)
    /// 3. Environment variables (prefixed with `CRASHRECORDER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sampler.period_ms == 0 {
            return Err(invalid("period_ms must be greater than 0"));
        }

        if self.sampler.capacity == 0 {
            return Err(invalid("capacity must be greater than 0"));
        }

        if self.channels.trigger.trim().is_empty() || self.channels.response.trim().is_empty() {
            return Err(invalid("channel names cannot be empty"));
        }

        if self.channels.trigger == self.channels.response {
            return Err(invalid(format!(
                "trigger and response channels must differ (both are '{}')",
                self.channels.trigger
            )));
        }

        for signal in Signal::ALL {
            if self.signals.path(signal).trim().is_empty() {
                return Err(invalid(format!("signal path for {signal} cannot be empty")));
            }
        }

        if self.output.path.as_os_str().is_empty() {
            return Err(invalid("output path cannot be empty"));
        }

        Ok(())
    }

    /// Get the sampling period as a Duration.
    #[must_use]
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sampler.period_ms)
    }

    /// Get the snapshot file path.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.path.clone()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
