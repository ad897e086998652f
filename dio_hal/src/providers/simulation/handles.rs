//! Device handles over the simulated board.
//!
//! Handles behave like their sysfs counterparts: same validation, same
//! force-close on an I/O failure, same idempotent `close()`.

use dio_common::hal::provider::{
    DeviceHandle, DigitalInputHandle, DigitalOutputHandle, HalError, PwmOutputHandle,
};
use dio_common::hal::pwm::{check_duty, duty_fraction, duty_ns, frequency_hz, period_ns};
use dio_common::hal::registry::Registration;
use dio_common::hal::types::{DeviceKey, EventTrigger, Polarity};
use std::sync::Arc;
use tracing::warn;

use super::board::SimBoard;

/// Line ownership shared by the three handle kinds.
#[derive(Debug)]
struct SimLineHandle {
    gpio: u32,
    board: Arc<SimBoard>,
    registration: Registration,
    /// Hardware PWM channel claim, for PWM handles only.
    channel: Option<Registration>,
    open: bool,
}

impl SimLineHandle {
    fn open(gpio: u32, board: Arc<SimBoard>, registration: Registration) -> Result<Self, HalError> {
        board.export(gpio)?;
        Ok(Self {
            gpio,
            board,
            registration,
            channel: None,
            open: true,
        })
    }

    fn with_channel(mut self, channel: Registration) -> Self {
        self.channel = Some(channel);
        self
    }

    fn check_open(&self) -> Result<(), HalError> {
        if self.open {
            Ok(())
        } else {
            Err(HalError::Closed(self.registration.key().clone()))
        }
    }

    fn guard<T>(&mut self, result: Result<T, HalError>) -> Result<T, HalError> {
        if result.is_err() {
            warn!("simulated gpio {}: I/O failure, closing", self.gpio);
            self.close();
        }
        result
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.board.unexport(self.gpio);
        if let Some(channel) = self.channel.as_mut() {
            channel.release();
        }
        self.registration.release();
    }
}

/// Simulated digital output.
#[derive(Debug)]
pub struct SimDigitalOutput {
    line: SimLineHandle,
}

impl SimDigitalOutput {
    pub(super) fn open(
        gpio: u32,
        board: Arc<SimBoard>,
        registration: Registration,
        initial_value: bool,
    ) -> Result<Self, HalError> {
        let mut out = Self {
            line: SimLineHandle::open(gpio, board, registration)?,
        };
        out.set_value(initial_value)?;
        Ok(out)
    }
}

impl DeviceHandle for SimDigitalOutput {
    fn key(&self) -> &DeviceKey {
        self.line.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.line.gpio
    }

    fn is_open(&self) -> bool {
        self.line.open
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.line.close();
        Ok(())
    }
}

impl DigitalOutputHandle for SimDigitalOutput {
    fn get_value(&mut self) -> Result<bool, HalError> {
        self.line.check_open()?;
        let result = self.line.board.read(self.line.gpio);
        self.line.guard(result)
    }

    fn set_value(&mut self, value: bool) -> Result<(), HalError> {
        self.line.check_open()?;
        let result = self.line.board.write(self.line.gpio, value);
        self.line.guard(result)
    }
}

impl Drop for SimDigitalOutput {
    fn drop(&mut self) {
        self.line.close();
    }
}

/// Simulated digital input. Levels are driven through
/// [`SimBoard::set_input`].
#[derive(Debug)]
pub struct SimDigitalInput {
    line: SimLineHandle,
    trigger: EventTrigger,
}

impl SimDigitalInput {
    pub(super) fn open(
        gpio: u32,
        board: Arc<SimBoard>,
        registration: Registration,
        trigger: EventTrigger,
    ) -> Result<Self, HalError> {
        Ok(Self {
            line: SimLineHandle::open(gpio, board, registration)?,
            trigger,
        })
    }

    /// Edge the input was configured with.
    pub fn trigger(&self) -> EventTrigger {
        self.trigger
    }
}

impl DeviceHandle for SimDigitalInput {
    fn key(&self) -> &DeviceKey {
        self.line.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.line.gpio
    }

    fn is_open(&self) -> bool {
        self.line.open
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.line.close();
        Ok(())
    }
}

impl DigitalInputHandle for SimDigitalInput {
    fn get_value(&mut self) -> Result<bool, HalError> {
        self.line.check_open()?;
        let result = self.line.board.read(self.line.gpio);
        self.line.guard(result)
    }
}

impl Drop for SimDigitalInput {
    fn drop(&mut self) {
        self.line.close();
    }
}

/// Simulated hardware PWM channel.
#[derive(Debug)]
pub struct SimPwmOutput {
    line: SimLineHandle,
    period_ns: u64,
}

impl SimPwmOutput {
    pub(super) fn open(
        gpio: u32,
        board: Arc<SimBoard>,
        registration: Registration,
        channel_registration: Registration,
        polarity: Polarity,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Self, HalError> {
        let period = period_ns(frequency_hz)?;
        check_duty(initial_duty)?;
        let mut pwm = Self {
            line: SimLineHandle::open(gpio, board, registration)?
                .with_channel(channel_registration),
            period_ns: period,
        };
        let result = pwm.bring_up(polarity, period, duty_ns(initial_duty, period));
        pwm.line.guard(result)?;
        Ok(pwm)
    }

    /// Same step order as a kernel channel, one attribute per step.
    fn bring_up(&self, polarity: Polarity, period: u64, duty: u64) -> Result<(), HalError> {
        let board = &self.line.board;
        let gpio = self.line.gpio;
        board.pwm_configure(gpio, |p| {
            p.polarity = polarity;
            Ok(())
        })?;
        self.write_duty(0)?;
        board.pwm_configure(gpio, |p| {
            p.period_ns = period;
            Ok(())
        })?;
        self.write_duty(duty)?;
        board.pwm_configure(gpio, |p| {
            p.enabled = true;
            Ok(())
        })
    }

    fn write_duty(&self, ns: u64) -> Result<(), HalError> {
        self.line.board.pwm_configure(self.line.gpio, |p| {
            p.duty_ns = ns;
            Ok(())
        })
    }

    fn change_period(&self, period: u64) -> Result<(), HalError> {
        let fraction = duty_fraction(self.line.board.pwm_duty(self.line.gpio)?, self.period_ns);
        self.write_duty(0)?;
        self.line.board.pwm_configure(self.line.gpio, |p| {
            p.period_ns = period;
            Ok(())
        })?;
        self.write_duty(duty_ns(fraction, period))
    }
}

impl DeviceHandle for SimPwmOutput {
    fn key(&self) -> &DeviceKey {
        self.line.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.line.gpio
    }

    fn is_open(&self) -> bool {
        self.line.open
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.line.close();
        Ok(())
    }
}

impl PwmOutputHandle for SimPwmOutput {
    fn get_value(&mut self) -> Result<f32, HalError> {
        self.line.check_open()?;
        let result = self.line.board.pwm_duty(self.line.gpio);
        let duty = self.line.guard(result)?;
        Ok(duty_fraction(duty, self.period_ns))
    }

    fn set_value(&mut self, value: f32) -> Result<(), HalError> {
        check_duty(value)?;
        self.line.check_open()?;
        let result = self.write_duty(duty_ns(value, self.period_ns));
        self.line.guard(result)
    }

    fn frequency(&self) -> u32 {
        frequency_hz(self.period_ns)
    }

    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HalError> {
        let period = period_ns(frequency_hz)?;
        self.line.check_open()?;
        let result = self.change_period(period);
        self.line.guard(result)?;
        self.period_ns = period;
        Ok(())
    }
}

impl Drop for SimPwmOutput {
    fn drop(&mut self) {
        self.line.close();
    }
}
