//! Hardware abstraction types shared by every provider.
//!
//! - [`pin`] - Pin descriptors and the board catalog
//! - [`types`] - Device keys and line configuration enums
//! - [`provider`] - Provider contract, handle traits and `HalError`
//! - [`registry`] - Process-wide device exclusivity table
//! - [`pwm`] - Frequency / duty conversions

pub mod pin;
pub mod provider;
pub mod pwm;
pub mod registry;
pub mod types;
