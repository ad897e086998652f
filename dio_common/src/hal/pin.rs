//! Pin descriptors and the read-only pin catalog.
//!
//! `PinInfo` records are produced by a board catalog (TOML `[[pins]]` tables
//! or code) and are never mutated by the HAL. Providers only read them to
//! decide whether a capability is available and which kernel node to drive.

use bitflags::bitflags;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::hal::provider::HalError;

// ─── DeviceMode ─────────────────────────────────────────────────────

/// A single capability a pin may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    /// Digital input.
    DigitalInput,
    /// Digital output.
    DigitalOutput,
    /// Hardware PWM output.
    PwmOutput,
    /// Analog input.
    AnalogInput,
    /// Analog output.
    AnalogOutput,
}

impl DeviceMode {
    /// All modes, in flag order.
    pub const ALL: [DeviceMode; 5] = [
        DeviceMode::DigitalInput,
        DeviceMode::DigitalOutput,
        DeviceMode::PwmOutput,
        DeviceMode::AnalogInput,
        DeviceMode::AnalogOutput,
    ];

    /// Flag corresponding to this mode.
    pub const fn flag(self) -> DeviceModes {
        match self {
            DeviceMode::DigitalInput => DeviceModes::DIGITAL_INPUT,
            DeviceMode::DigitalOutput => DeviceModes::DIGITAL_OUTPUT,
            DeviceMode::PwmOutput => DeviceModes::PWM_OUTPUT,
            DeviceMode::AnalogInput => DeviceModes::ANALOG_INPUT,
            DeviceMode::AnalogOutput => DeviceModes::ANALOG_OUTPUT,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DigitalInput => "digital input",
            Self::DigitalOutput => "digital output",
            Self::PwmOutput => "pwm output",
            Self::AnalogInput => "analog input",
            Self::AnalogOutput => "analog output",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Set of capabilities supported by a pin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceModes: u8 {
        /// Digital input.
        const DIGITAL_INPUT  = 0x01;
        /// Digital output.
        const DIGITAL_OUTPUT = 0x02;
        /// Hardware PWM output.
        const PWM_OUTPUT     = 0x04;
        /// Analog input.
        const ANALOG_INPUT   = 0x08;
        /// Analog output.
        const ANALOG_OUTPUT  = 0x10;
    }
}

impl DeviceModes {
    /// Digital in + out, the capability set of a plain GPIO line.
    pub const GPIO: Self = Self::from_bits_truncate(
        Self::DIGITAL_INPUT.bits() | Self::DIGITAL_OUTPUT.bits(),
    );

    /// Returns true if `mode` is in the set.
    #[inline]
    pub const fn supports(&self, mode: DeviceMode) -> bool {
        self.contains(mode.flag())
    }

    /// Iterate the contained modes in flag order.
    pub fn modes(&self) -> impl Iterator<Item = DeviceMode> + '_ {
        DeviceMode::ALL.into_iter().filter(|m| self.supports(*m))
    }
}

impl Default for DeviceModes {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<DeviceMode> for DeviceModes {
    fn from_iter<I: IntoIterator<Item = DeviceMode>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |acc, mode| acc | mode.flag())
    }
}

// TOML representation is a list of mode names: `modes = ["digital_output", "pwm_output"]`.
impl Serialize for DeviceModes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for mode in self.modes() {
            seq.serialize_element(&mode)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DeviceModes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let modes = Vec::<DeviceMode>::deserialize(deserializer)?;
        Ok(modes.into_iter().collect())
    }
}

// ─── PinInfo ────────────────────────────────────────────────────────

/// Hardware PWM channel backing a pin: `/sys/class/pwm/pwmchip<chip>/pwm<channel>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PwmChannel {
    /// PWM chip index.
    pub chip: u32,
    /// Channel index within the chip.
    pub channel: u32,
}

/// Identity and capability descriptor of a physical pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinInfo {
    /// Logical (kernel) GPIO number.
    pub gpio: u32,
    /// GPIO chip / controller number.
    #[serde(default)]
    pub chip: u32,
    /// Board label, e.g. `"GPIO18"`.
    #[serde(default)]
    pub name: Option<String>,
    /// Hardware PWM channel, if the pin is wired to one.
    #[serde(default)]
    pub pwm: Option<PwmChannel>,
    /// Supported capabilities.
    #[serde(default)]
    pub modes: DeviceModes,
}

impl PinInfo {
    /// Create a descriptor for `gpio` on chip 0.
    pub fn new(gpio: u32, modes: DeviceModes) -> Self {
        Self {
            gpio,
            chip: 0,
            name: None,
            pwm: None,
            modes,
        }
    }

    /// Attach a hardware PWM channel. Also advertises `PWM_OUTPUT`.
    pub fn with_pwm(mut self, chip: u32, channel: u32) -> Self {
        self.pwm = Some(PwmChannel { chip, channel });
        self.modes |= DeviceModes::PWM_OUTPUT;
        self
    }

    /// Set the GPIO chip number.
    pub fn with_chip(mut self, chip: u32) -> Self {
        self.chip = chip;
        self
    }

    /// Set the board label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the pin advertises `mode`.
    #[inline]
    pub fn supports(&self, mode: DeviceMode) -> bool {
        self.modes.supports(mode)
    }

    /// Fail with [`HalError::UnsupportedMode`] unless the pin advertises `mode`.
    pub fn require(&self, mode: DeviceMode) -> Result<(), HalError> {
        if self.supports(mode) {
            Ok(())
        } else {
            Err(HalError::UnsupportedMode {
                gpio: self.gpio,
                mode,
            })
        }
    }
}

impl fmt::Display for PinInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} (gpio {})", self.gpio),
            None => write!(f, "gpio {}", self.gpio),
        }
    }
}

// ─── PinCatalog ─────────────────────────────────────────────────────

/// Catalog construction error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two records claim the same GPIO number.
    #[error("duplicate gpio {0} in pin catalog")]
    DuplicateGpio(u32),

    /// Two records claim the same PWM channel.
    #[error("pwmchip{chip}/pwm{channel} assigned to both gpio {first} and gpio {second}")]
    DuplicatePwmChannel {
        chip: u32,
        channel: u32,
        first: u32,
        second: u32,
    },
}

/// Read-only lookup table of [`PinInfo`] records, keyed by GPIO number.
///
/// Built once at startup and handed to `HalCore`; there is no global board
/// singleton.
#[derive(Debug, Clone, Default)]
pub struct PinCatalog {
    pins: Vec<PinInfo>,
    by_gpio: HashMap<u32, usize>,
}

impl PinCatalog {
    /// Build a catalog, rejecting duplicate GPIO numbers and PWM channels.
    pub fn from_pins(pins: Vec<PinInfo>) -> Result<Self, CatalogError> {
        let mut by_gpio = HashMap::with_capacity(pins.len());
        let mut by_pwm: HashMap<PwmChannel, u32> = HashMap::new();

        for (idx, pin) in pins.iter().enumerate() {
            if by_gpio.insert(pin.gpio, idx).is_some() {
                return Err(CatalogError::DuplicateGpio(pin.gpio));
            }
            if let Some(pwm) = pin.pwm {
                if let Some(first) = by_pwm.insert(pwm, pin.gpio) {
                    return Err(CatalogError::DuplicatePwmChannel {
                        chip: pwm.chip,
                        channel: pwm.channel,
                        first,
                        second: pin.gpio,
                    });
                }
            }
        }

        Ok(Self { pins, by_gpio })
    }

    /// Look up a pin by GPIO number.
    pub fn by_gpio(&self, gpio: u32) -> Option<&PinInfo> {
        self.by_gpio.get(&gpio).map(|&idx| &self.pins[idx])
    }

    /// Look up a pin by GPIO number, failing with [`HalError::UnknownPin`].
    pub fn by_gpio_or_err(&self, gpio: u32) -> Result<&PinInfo, HalError> {
        self.by_gpio(gpio).ok_or(HalError::UnknownPin(gpio))
    }

    /// All pins in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PinInfo> {
        self.pins.iter()
    }

    /// Number of pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Returns true if the catalog holds no pins.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
