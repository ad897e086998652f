//! Sysfs hardware PWM channels:
//! `/sys/class/pwm/pwmchip<C>/pwm<N>/{polarity,period,duty_cycle,enable}`.
//!
//! # Ordering
//!
//! The kernel rejects a duty cycle larger than the current period, and an
//! enabled channel in that state. Bring-up therefore writes, in order:
//! polarity, duty 0, period, duty, enable. A frequency change parks the duty at
//! 0 before writing the new period and then restores the previous fraction.

use dio_common::consts::{DUTY_CYCLE_FILE, ENABLE_FILE, PERIOD_FILE, POLARITY_FILE};
use dio_common::hal::pin::PwmChannel;
use dio_common::hal::provider::{DeviceHandle, HalError, PwmOutputHandle};
use dio_common::hal::pwm::{check_duty, duty_fraction, duty_ns, frequency_hz, period_ns};
use dio_common::hal::registry::Registration;
use dio_common::hal::types::{DeviceKey, Polarity};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::attr::{AttrFile, write_attr};
use super::export::SysfsExporter;

/// Sysfs hardware PWM output.
#[derive(Debug)]
pub struct SysfsPwmOutput {
    gpio: u32,
    chip: u32,
    channel: u32,
    exporter: SysfsExporter,
    registration: Registration,
    /// Claim on the chip/channel pair, shared by every pin wired to it.
    channel_registration: Registration,
    channel_dir: PathBuf,
    polarity: Polarity,
    period_ns: u64,
    /// Persistent handle on `duty_cycle`; `None` once closed.
    duty: Option<AttrFile>,
    enabled: bool,
}

impl SysfsPwmOutput {
    /// Export, configure and enable the channel.
    ///
    /// Arguments are validated before any I/O. Any failure after the export
    /// tears the channel down again (disable, close, unexport) before the
    /// error is returned.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn open(
        gpio: u32,
        pwm_channel: PwmChannel,
        exporter: SysfsExporter,
        registration: Registration,
        channel_registration: Registration,
        polarity: Polarity,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Self, HalError> {
        let period = period_ns(frequency_hz)?;
        check_duty(initial_duty)?;
        let PwmChannel { chip, channel } = pwm_channel;

        let channel_dir = exporter.export(channel, PERIOD_FILE)?;
        let duty = match AttrFile::open(channel_dir.join(DUTY_CYCLE_FILE)) {
            Ok(duty) => duty,
            Err(e) => {
                exporter.unexport_quietly(channel);
                return Err(e);
            }
        };

        let mut pwm = Self {
            gpio,
            chip,
            channel,
            exporter,
            registration,
            channel_registration,
            channel_dir,
            polarity,
            period_ns: 0,
            duty: Some(duty),
            enabled: false,
        };

        if let Err(e) = pwm.bring_up(period, initial_duty) {
            pwm.teardown();
            return Err(e);
        }
        Ok(pwm)
    }

    fn bring_up(&mut self, period: u64, initial_duty: f32) -> Result<(), HalError> {
        write_attr(
            &self.channel_dir.join(POLARITY_FILE),
            self.polarity.sysfs_value(),
        )?;
        self.write_duty_ns(0)?;
        self.write_period(period)?;
        self.write_duty_ns(duty_ns(initial_duty, period))?;
        self.write_enable(true)
    }

    /// PWM chip index.
    pub fn chip(&self) -> u32 {
        self.chip
    }

    /// Channel index within the chip.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Configured polarity.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Current period in nanoseconds.
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    fn duty_file(&mut self) -> Result<&mut AttrFile, HalError> {
        match self.duty.as_mut() {
            Some(duty) => Ok(duty),
            None => Err(HalError::Closed(self.registration.key().clone())),
        }
    }

    fn write_duty_ns(&mut self, ns: u64) -> Result<(), HalError> {
        if ns > self.period_ns {
            return Err(HalError::InvalidArgument(format!(
                "duty {ns} ns exceeds period {} ns",
                self.period_ns
            )));
        }
        self.duty_file()?.write(&ns.to_string())
    }

    fn write_period(&mut self, ns: u64) -> Result<(), HalError> {
        write_attr(&self.channel_dir.join(PERIOD_FILE), &ns.to_string())?;
        self.period_ns = ns;
        Ok(())
    }

    fn write_enable(&mut self, enabled: bool) -> Result<(), HalError> {
        write_attr(
            &self.channel_dir.join(ENABLE_FILE),
            if enabled { "1" } else { "0" },
        )?;
        self.enabled = enabled;
        Ok(())
    }

    fn read_fraction(&mut self) -> Result<f32, HalError> {
        let ns = self.duty_file()?.read_u64()?;
        Ok(duty_fraction(ns, self.period_ns))
    }

    fn change_period(&mut self, period: u64) -> Result<(), HalError> {
        let fraction = self.read_fraction()?;
        self.write_duty_ns(0)?;
        self.write_period(period)?;
        self.write_duty_ns(duty_ns(fraction, period))
    }

    /// A failed node access leaves the channel unusable: close it, then
    /// surface the original error.
    fn close_on_error<T>(&mut self, result: Result<T, HalError>) -> Result<T, HalError> {
        if let Err(e) = &result {
            if !matches!(e, HalError::Closed(_)) {
                warn!("pwmchip{}/pwm{}: {}, closing channel", self.chip, self.channel, e);
                self.teardown();
            }
        }
        result
    }

    /// Disable, close and unexport. Each step runs regardless of the others.
    fn teardown(&mut self) {
        if self.duty.is_none() {
            return;
        }
        if self.enabled {
            if let Err(e) = self.write_enable(false) {
                debug!("pwmchip{}/pwm{}: disable failed: {}", self.chip, self.channel, e);
            }
        }
        self.duty = None;
        self.exporter.unexport_quietly(self.channel);
        self.channel_registration.release();
        self.registration.release();
    }
}

impl DeviceHandle for SysfsPwmOutput {
    fn key(&self) -> &DeviceKey {
        self.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.gpio
    }

    fn is_open(&self) -> bool {
        self.duty.is_some()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.teardown();
        Ok(())
    }
}

impl PwmOutputHandle for SysfsPwmOutput {
    fn get_value(&mut self) -> Result<f32, HalError> {
        let result = self.read_fraction();
        self.close_on_error(result)
    }

    fn set_value(&mut self, value: f32) -> Result<(), HalError> {
        check_duty(value)?;
        let ns = duty_ns(value, self.period_ns);
        let result = self.write_duty_ns(ns);
        self.close_on_error(result)
    }

    fn frequency(&self) -> u32 {
        frequency_hz(self.period_ns)
    }

    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HalError> {
        let period = period_ns(frequency_hz)?;
        debug!(
            "pwmchip{}/pwm{}: period {} -> {} ns",
            self.chip, self.channel, self.period_ns, period
        );
        let result = self.change_period(period);
        self.close_on_error(result)
    }
}

impl Drop for SysfsPwmOutput {
    fn drop(&mut self) {
        self.teardown();
    }
}
