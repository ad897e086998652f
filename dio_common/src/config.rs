//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load the HAL's TOML
//! configuration: provider selection, sysfs locations and timing, PWM
//! defaults, blink pool sizing and the board pin catalog.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dio_common::config::{ConfigError, ConfigLoader, HalConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = HalConfig::load(Path::new("/etc/dio/hal.toml"))?;
//!     config.validate()?;
//!     println!("Provider: {}", config.provider);
//!     Ok(())
//! }
//! ```
//!
//! # TOML Example
//!
//! ```toml
//! log_level = "debug"
//! provider = "sysfs"
//!
//! [sysfs]
//! export_poll_interval_ms = 10
//! export_timeout_ms = 500
//!
//! [pwm]
//! default_frequency_hz = 100
//! software_fallback = true
//!
//! [[pins]]
//! gpio = 18
//! name = "GPIO18"
//! modes = ["digital_input", "digital_output", "pwm_output"]
//! pwm = { chip = 0, channel = 0 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_BLINK_POOL_THREADS, DEFAULT_PROVIDER, DEFAULT_PWM_FREQUENCY_HZ, EXPORT_POLL_INTERVAL,
    EXPORT_TIMEOUT, NS_PER_SEC, SYSFS_GPIO_ROOT, SYSFS_PWM_ROOT,
};
use crate::hal::pin::{PinCatalog, PinInfo};

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Location and timing of the kernel sysfs interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsConfig {
    /// GPIO class directory (normally `/sys/class/gpio`).
    pub gpio_root: PathBuf,
    /// PWM class directory (normally `/sys/class/pwm`).
    pub pwm_root: PathBuf,
    /// Sleep between checks for a freshly exported node [ms].
    pub export_poll_interval_ms: u64,
    /// Give up waiting for an exported node after this long [ms].
    pub export_timeout_ms: u64,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            gpio_root: PathBuf::from(SYSFS_GPIO_ROOT),
            pwm_root: PathBuf::from(SYSFS_PWM_ROOT),
            export_poll_interval_ms: EXPORT_POLL_INTERVAL.as_millis() as u64,
            export_timeout_ms: EXPORT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SysfsConfig {
    /// Sysfs layout rooted at `root` (`<root>/gpio`, `<root>/pwm`). Used for
    /// fake trees in tests and chroot-style deployments.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            gpio_root: root.join("gpio"),
            pwm_root: root.join("pwm"),
            ..Self::default()
        }
    }

    /// Export poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.export_poll_interval_ms)
    }

    /// Export wait bound.
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }
}

/// PWM defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    /// Frequency used when the caller does not specify one [Hz].
    pub default_frequency_hz: u32,
    /// Emulate PWM on a digital output when no hardware channel is available.
    pub software_fallback: bool,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            default_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
            software_fallback: true,
        }
    }
}

/// Background blink pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Workers kept warm; the pool grows past this when every worker is busy.
    pub pool_threads: usize,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            pool_threads: DEFAULT_BLINK_POOL_THREADS,
        }
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

/// Top-level HAL configuration (`hal.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HalConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Provider selected at startup.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Sysfs provider settings.
    #[serde(default)]
    pub sysfs: SysfsConfig,

    /// PWM defaults.
    #[serde(default)]
    pub pwm: PwmConfig,

    /// Blink scheduler settings.
    #[serde(default)]
    pub blink: BlinkConfig,

    /// Board pin catalog.
    #[serde(default)]
    pub pins: Vec<PinInfo>,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            provider: default_provider(),
            sysfs: SysfsConfig::default(),
            pwm: PwmConfig::default(),
            blink: BlinkConfig::default(),
            pins: Vec::new(),
        }
    }
}

impl HalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `provider` is empty
    /// - the export poll interval or timeout is zero, or the interval exceeds
    ///   the timeout
    /// - the default PWM frequency is outside `1..=1_000_000_000`
    /// - the pin catalog contains duplicates
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider cannot be empty".to_string(),
            ));
        }
        if self.sysfs.export_poll_interval_ms == 0 || self.sysfs.export_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sysfs export poll interval and timeout must be non-zero".to_string(),
            ));
        }
        if self.sysfs.export_poll_interval_ms > self.sysfs.export_timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "export_poll_interval_ms ({}) exceeds export_timeout_ms ({})",
                self.sysfs.export_poll_interval_ms, self.sysfs.export_timeout_ms
            )));
        }
        let freq = u64::from(self.pwm.default_frequency_hz);
        if freq == 0 || freq > NS_PER_SEC {
            return Err(ConfigError::ValidationError(format!(
                "pwm.default_frequency_hz {freq} outside 1..={NS_PER_SEC}"
            )));
        }
        self.catalog()?;
        Ok(())
    }

    /// Build the pin catalog from `[[pins]]`.
    pub fn catalog(&self) -> Result<PinCatalog, ConfigError> {
        PinCatalog::from_pins(self.pins.clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
