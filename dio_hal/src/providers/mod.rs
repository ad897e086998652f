//! Provider implementations.
//!
//! - [`sysfs`] - Linux `/sys/class/gpio` and `/sys/class/pwm`
//! - [`simulation`] - in-memory board for development and tests

pub mod simulation;
pub mod sysfs;
