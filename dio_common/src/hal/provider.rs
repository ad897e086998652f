//! Provider contract and error types.
//!
//! This module defines:
//! - `Provider` trait - Interface every backend implements (sysfs, simulation,
//!   remote, native library)
//! - `DeviceHandle` and the per-capability handle traits returned by it
//! - `HalError` enum - Error taxonomy shared by all providers
//! - `ProviderFactory` type alias - Factory function type

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::HalConfig;
use crate::hal::pin::{DeviceMode, PinInfo};
use crate::hal::registry::DeviceRegistry;
use crate::hal::types::{DeviceKey, EventTrigger, PullUpDown};

/// Error types for HAL operations.
#[derive(Debug, Error)]
pub enum HalError {
    /// Pin does not advertise the requested capability.
    #[error("gpio {gpio} does not support {mode}")]
    UnsupportedMode {
        /// GPIO number of the pin.
        gpio: u32,
        /// Requested capability.
        mode: DeviceMode,
    },

    /// Another live device already owns the key.
    #[error("device {0} is already open")]
    AlreadyOpen(DeviceKey),

    /// A kernel node never became writable.
    #[error("timed out after {}ms waiting for {}", waited.as_millis(), path.display())]
    Timeout {
        /// Node that was waited on.
        path: PathBuf,
        /// Total time waited.
        waited: Duration,
    },

    /// Argument outside its valid domain. Never clamped.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Read, write or parse failure against a device node.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Operation on a handle that has been closed.
    #[error("device {0} is closed")]
    Closed(DeviceKey),

    /// No catalog record for the GPIO number.
    #[error("unknown gpio {0}")]
    UnknownPin(u32),

    /// Provider not found in the provider registry.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HalError {
    /// Wrap an I/O error with a description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true if a caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io { .. })
    }
}

impl From<io::Error> for HalError {
    fn from(source: io::Error) -> Self {
        Self::io("I/O error", source)
    }
}

/// Factory function type for creating provider instances.
///
/// Every provider built for one process receives the same registry, which is
/// what makes exclusivity process-wide.
pub type ProviderFactory =
    fn(&HalConfig, Arc<DeviceRegistry>) -> Result<Box<dyn Provider>, HalError>;

/// Common surface of every provisioned device.
pub trait DeviceHandle: Send {
    /// Exclusivity key the device is registered under.
    fn key(&self) -> &DeviceKey;

    /// GPIO number of the underlying pin.
    fn gpio(&self) -> u32;

    /// Returns false once `close()` has run (or the handle was force-closed
    /// after an I/O failure).
    fn is_open(&self) -> bool;

    /// Release every resource held by the handle.
    ///
    /// Safe to call any number of times; only the first call has effect.
    fn close(&mut self) -> Result<(), HalError>;
}

/// Digital input handle.
pub trait DigitalInputHandle: DeviceHandle {
    /// Read the physical line level.
    fn get_value(&mut self) -> Result<bool, HalError>;
}

/// Digital output handle. Values are physical levels, no polarity mapping.
pub trait DigitalOutputHandle: DeviceHandle {
    /// Read back the physical line level.
    fn get_value(&mut self) -> Result<bool, HalError>;

    /// Drive the physical line level.
    fn set_value(&mut self, value: bool) -> Result<(), HalError>;
}

/// PWM output handle. Values are duty fractions in `[0, 1]`.
pub trait PwmOutputHandle: DeviceHandle {
    /// Current duty fraction.
    fn get_value(&mut self) -> Result<f32, HalError>;

    /// Set the duty fraction.
    ///
    /// # Errors
    /// `HalError::InvalidArgument` if `value` is outside `[0, 1]`, before any
    /// I/O is attempted.
    fn set_value(&mut self, value: f32) -> Result<(), HalError>;

    /// Current output frequency in Hz.
    fn frequency(&self) -> u32;

    /// Change the output frequency, preserving the duty fraction.
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HalError>;
}

/// Trait defining the interface for device providers.
///
/// The HAL drives every backend through this trait, enabling pluggable
/// hardware access (kernel sysfs, simulation, remote RPC, native libraries).
///
/// # Provisioning contract
///
/// Every `provision_*` call:
/// 1. fails with `HalError::UnsupportedMode` if the pin lacks the capability;
/// 2. fails with `HalError::AlreadyOpen` if the pin's key is registered,
///    before any hardware side effect;
/// 3. on a later failure, rolls back every side effect it already performed
///    before returning the error.
pub trait Provider: Send + Sync {
    /// Returns the provider's unique identifier (e.g. "sysfs", "simulation").
    /// Also the prefix of every `DeviceKey` it issues.
    fn name(&self) -> &'static str;

    /// Whether `provision_pwm_output` can drive a hardware channel.
    /// Default: true
    fn supports_hardware_pwm(&self) -> bool {
        true
    }

    /// Provision a digital input.
    fn provision_digital_input(
        &self,
        pin: &PinInfo,
        pud: PullUpDown,
        trigger: EventTrigger,
    ) -> Result<Box<dyn DigitalInputHandle>, HalError>;

    /// Provision a digital output driven to `initial_value` (physical level).
    fn provision_digital_output(
        &self,
        pin: &PinInfo,
        initial_value: bool,
    ) -> Result<Box<dyn DigitalOutputHandle>, HalError>;

    /// Provision a hardware PWM output.
    fn provision_pwm_output(
        &self,
        pin: &PinInfo,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Box<dyn PwmOutputHandle>, HalError>;

    /// Release provider-wide resources.
    /// Default: no-op
    fn shutdown(&self) -> Result<(), HalError> {
        Ok(())
    }
}
