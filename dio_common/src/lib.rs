//! dio Common Library
//!
//! This crate provides the types every dio provider and consumer shares:
//! pin descriptors, the provider contract, the device registry, error types
//! and configuration loading.
//!
//! # Module Structure
//!
//! - [`hal`] - Pins, provider contract, registry, PWM conversions
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Sysfs paths and timing defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use dio_common::prelude::*;
//!
//! let pin = PinInfo::new(18, DeviceModes::GPIO).with_pwm(0, 0);
//! assert!(pin.supports(DeviceMode::PwmOutput));
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
