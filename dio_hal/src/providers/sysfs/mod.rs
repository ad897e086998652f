//! Linux sysfs provider.
//!
//! Drives `/sys/class/gpio` and `/sys/class/pwm` directly. Every
//! `provision_*` call claims the pin's key in the shared [`DeviceRegistry`]
//! (and, for PWM, the channel's key) before touching the kernel, then exports the node and configures it. Any
//! failure after the export undoes it before the error is returned.

mod attr;
mod export;
mod gpio;
mod pwm;

pub use export::SysfsExporter;
pub use gpio::{SysfsDigitalInput, SysfsDigitalOutput};
pub use pwm::SysfsPwmOutput;

use dio_common::config::{HalConfig, SysfsConfig};
use dio_common::hal::pin::{DeviceMode, PinInfo};
use dio_common::hal::provider::{
    DigitalInputHandle, DigitalOutputHandle, HalError, Provider, PwmOutputHandle,
};
use dio_common::hal::pwm::{check_duty, period_ns};
use dio_common::hal::registry::DeviceRegistry;
use dio_common::hal::types::{DeviceKey, EventTrigger, Polarity, PullUpDown};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Provider driving the kernel sysfs GPIO and PWM classes.
pub struct SysfsProvider {
    gpio: SysfsExporter,
    pwm_root: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
    registry: Arc<DeviceRegistry>,
}

impl SysfsProvider {
    /// Provider name, also the `DeviceKey` prefix.
    pub const NAME: &'static str = "sysfs";

    /// Create a provider for the sysfs layout in `config`.
    pub fn new(config: &SysfsConfig, registry: Arc<DeviceRegistry>) -> Self {
        let poll_interval = config.poll_interval();
        let timeout = config.export_timeout();
        Self {
            gpio: SysfsExporter::new(config.gpio_root.clone(), "gpio", poll_interval, timeout),
            pwm_root: config.pwm_root.clone(),
            poll_interval,
            timeout,
            registry,
        }
    }

    fn pwm_chip(&self, chip: u32) -> SysfsExporter {
        SysfsExporter::new(
            self.pwm_root.join(format!("pwmchip{chip}")),
            "pwm",
            self.poll_interval,
            self.timeout,
        )
    }

    /// Provision a hardware PWM output with an explicit polarity.
    pub fn provision_pwm_with_polarity(
        &self,
        pin: &PinInfo,
        polarity: Polarity,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<SysfsPwmOutput, HalError> {
        pin.require(DeviceMode::PwmOutput)?;
        let channel = pin.pwm.ok_or(HalError::UnsupportedMode {
            gpio: pin.gpio,
            mode: DeviceMode::PwmOutput,
        })?;
        period_ns(frequency_hz)?;
        check_duty(initial_duty)?;

        let registration = self
            .registry
            .register(DeviceKey::for_pin(Self::NAME, pin), DeviceMode::PwmOutput)?;
        let channel_registration = self
            .registry
            .register(DeviceKey::for_pwm_channel(Self::NAME, channel), DeviceMode::PwmOutput)?;
        info!(
            "Provisioning pwmchip{}/pwm{} (gpio {}) at {} Hz, duty {}",
            channel.chip, channel.channel, pin.gpio, frequency_hz, initial_duty
        );
        SysfsPwmOutput::open(
            pin.gpio,
            channel,
            self.pwm_chip(channel.chip),
            registration,
            channel_registration,
            polarity,
            frequency_hz,
            initial_duty,
        )
    }
}

impl Provider for SysfsProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn provision_digital_input(
        &self,
        pin: &PinInfo,
        pud: PullUpDown,
        trigger: EventTrigger,
    ) -> Result<Box<dyn DigitalInputHandle>, HalError> {
        pin.require(DeviceMode::DigitalInput)?;
        let registration = self
            .registry
            .register(DeviceKey::for_pin(Self::NAME, pin), DeviceMode::DigitalInput)?;
        if pud != PullUpDown::None {
            warn!(
                "gpio {}: pull up/down cannot be configured through sysfs, ignoring {:?}",
                pin.gpio, pud
            );
        }
        info!("Provisioning gpio {} as input ({:?})", pin.gpio, trigger);
        let input = SysfsDigitalInput::open(pin.gpio, self.gpio.clone(), registration, trigger)?;
        Ok(Box::new(input))
    }

    fn provision_digital_output(
        &self,
        pin: &PinInfo,
        initial_value: bool,
    ) -> Result<Box<dyn DigitalOutputHandle>, HalError> {
        pin.require(DeviceMode::DigitalOutput)?;
        let registration = self
            .registry
            .register(DeviceKey::for_pin(Self::NAME, pin), DeviceMode::DigitalOutput)?;
        info!("Provisioning gpio {} as output ({})", pin.gpio, initial_value);
        let output =
            SysfsDigitalOutput::open(pin.gpio, self.gpio.clone(), registration, initial_value)?;
        Ok(Box::new(output))
    }

    fn provision_pwm_output(
        &self,
        pin: &PinInfo,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Box<dyn PwmOutputHandle>, HalError> {
        let pwm =
            self.provision_pwm_with_polarity(pin, Polarity::Normal, frequency_hz, initial_duty)?;
        Ok(Box::new(pwm))
    }
}

/// Factory registered under [`SysfsProvider::NAME`].
pub fn create_provider(
    config: &HalConfig,
    registry: Arc<DeviceRegistry>,
) -> Result<Box<dyn Provider>, HalError> {
    Ok(Box::new(SysfsProvider::new(&config.sysfs, registry)))
}
