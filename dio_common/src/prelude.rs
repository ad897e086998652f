//! Prelude module for common re-exports.
//!
//! Consumers can do `use dio_common::prelude::*;` and get the most
//! important types without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, HalConfig, LogLevel};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::hal::pin::{DeviceMode, DeviceModes, PinCatalog, PinInfo, PwmChannel};

// ─── Provider contract ──────────────────────────────────────────────
pub use crate::hal::provider::{
    DeviceHandle, DigitalInputHandle, DigitalOutputHandle, HalError, Provider, ProviderFactory,
    PwmOutputHandle,
};
pub use crate::hal::registry::{DeviceRegistry, Registration};
pub use crate::hal::types::{DeviceKey, Direction, EventTrigger, Polarity, PullUpDown};
