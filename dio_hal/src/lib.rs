//! # dio HAL Library
//!
//! Device provisioning over pluggable providers, with a Linux sysfs provider
//! and an in-memory simulation provider.
//!
//! # Module Structure
//!
//! - [`core`] - HalCore: provider selection, provisioning by GPIO number
//! - [`provider_registry`] - Provider factory registration
//! - [`providers`] - Provider implementations (sysfs, simulation)
//! - [`output`] - Digital output device with polarity and blink
//! - [`blink`] - Blink loop scheduling and cancellation
//! - [`software_pwm`] - PWM emulated on a digital output
//! - [`executor`] - Background task executors
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         dio_hal                                │
//! │  ┌──────────────┐   ┌───────────────┐   ┌───────────────────┐  │
//! │  │ PinCatalog   │──►│   HalCore     │◄──│ ProviderRegistry  │  │
//! │  └──────────────┘   └──────┬────────┘   └───────────────────┘  │
//! │                            │                                   │
//! │              ┌─────────────┼──────────────┐                    │
//! │              ▼             ▼              ▼                    │
//! │     DigitalOutputDevice  Provider ──► DeviceRegistry           │
//! │     (blink, executor)   (sysfs, simulation)                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod blink;
pub mod core;
pub mod executor;
pub mod output;
pub mod provider_registry;
pub mod providers;
pub mod software_pwm;

// Re-export key types for convenience
pub use crate::blink::{BlinkSpec, Iterations};
pub use crate::core::HalCore;
pub use crate::executor::{DaemonPool, InlineExecutor, TaskExecutor};
pub use crate::output::DigitalOutputDevice;
pub use crate::provider_registry::ProviderRegistry;
pub use crate::software_pwm::SoftwarePwmOutput;
