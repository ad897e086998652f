//! Value types shared by providers and devices.
//!
//! - `DeviceKey` - exclusivity key for a physical pin
//! - `PullUpDown` / `EventTrigger` - digital input configuration
//! - `Direction` - GPIO line direction
//! - `Polarity` - PWM output polarity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hal::pin::{PinInfo, PwmChannel};

/// Exclusivity key of a physical resource.
///
/// A pin's key is derived from the provider name and its GPIO number, so the
/// same pin maps to the same key regardless of the capability requested. A
/// hardware PWM channel has a key of its own: several pins may be wired to
/// one channel, and only one of them may drive it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey(String);

impl DeviceKey {
    /// Key for `pin` when provisioned through `provider`.
    pub fn for_pin(provider: &str, pin: &PinInfo) -> Self {
        Self::for_gpio(provider, pin.gpio)
    }

    /// Key for a bare GPIO number.
    pub fn for_gpio(provider: &str, gpio: u32) -> Self {
        Self(format!("{provider}-{gpio}"))
    }

    /// Key for a hardware PWM channel.
    pub fn for_pwm_channel(provider: &str, channel: PwmChannel) -> Self {
        Self(format!(
            "{provider}-pwmchip{}-pwm{}",
            channel.chip, channel.channel
        ))
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internal pull resistor request for a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullUpDown {
    /// Leave the line floating.
    #[default]
    None,
    /// Pull up to VCC.
    PullUp,
    /// Pull down to ground.
    PullDown,
}

/// Edge(s) on which a digital input raises events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTrigger {
    /// No events.
    #[default]
    None,
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
    /// Either edge.
    Both,
}

impl EventTrigger {
    /// Value written to the sysfs `edge` attribute.
    pub const fn sysfs_value(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }
}

/// GPIO line direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Input.
    In,
    /// Output.
    Out,
}

impl Direction {
    /// Value written to the sysfs `direction` attribute.
    pub const fn sysfs_value(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sysfs_value())
    }
}

/// PWM output polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Active during the duty portion of the period.
    #[default]
    Normal,
    /// Inactive during the duty portion of the period.
    Inversed,
}

impl Polarity {
    /// Value written to the sysfs `polarity` attribute.
    pub const fn sysfs_value(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Inversed => "inversed",
        }
    }
}
