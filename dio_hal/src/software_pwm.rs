//! PWM emulated on a digital output.
//!
//! The output blinks forever in the background with
//! `on = duty * period` and `off = (1 - duty) * period`. Duty 0 and 1 are
//! plain off / on writes with no loop. Timing is only as good as the
//! scheduler, so this is for LEDs and similar loads.

use dio_common::hal::provider::{DeviceHandle, HalError, PwmOutputHandle};
use dio_common::hal::pwm::{check_duty, period_ns};
use dio_common::hal::types::DeviceKey;
use std::time::Duration;
use tracing::debug;

use crate::blink::{BlinkSpec, Iterations};
use crate::output::DigitalOutputDevice;

/// Software PWM over a [`DigitalOutputDevice`].
pub struct SoftwarePwmOutput {
    output: DigitalOutputDevice,
    frequency_hz: u32,
    duty: f32,
}

impl SoftwarePwmOutput {
    /// Start emulating PWM on `output`.
    pub fn new(
        output: DigitalOutputDevice,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Self, HalError> {
        period_ns(frequency_hz)?;
        check_duty(initial_duty)?;
        let mut pwm = Self {
            output,
            frequency_hz,
            duty: initial_duty,
        };
        pwm.apply()?;
        Ok(pwm)
    }

    fn apply(&mut self) -> Result<(), HalError> {
        if self.duty <= 0.0 {
            return self.output.off();
        }
        if self.duty >= 1.0 {
            return self.output.on();
        }
        let period = Duration::from_nanos(period_ns(self.frequency_hz)?);
        let on_time = period.mul_f32(self.duty);
        let spec = BlinkSpec::new(on_time, period - on_time, Iterations::Infinite);
        debug!(
            "gpio {}: software pwm {} Hz, duty {}",
            self.output.gpio(),
            self.frequency_hz,
            self.duty
        );
        self.output.blink(spec, true, None)
    }

    fn check_open(&self) -> Result<(), HalError> {
        if self.output.is_open() {
            Ok(())
        } else {
            Err(HalError::Closed(self.output.key().clone()))
        }
    }
}

impl DeviceHandle for SoftwarePwmOutput {
    fn key(&self) -> &DeviceKey {
        self.output.key()
    }

    fn gpio(&self) -> u32 {
        self.output.gpio()
    }

    fn is_open(&self) -> bool {
        self.output.is_open()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.output.close()
    }
}

impl PwmOutputHandle for SoftwarePwmOutput {
    fn get_value(&mut self) -> Result<f32, HalError> {
        self.check_open()?;
        Ok(self.duty)
    }

    fn set_value(&mut self, value: f32) -> Result<(), HalError> {
        check_duty(value)?;
        self.check_open()?;
        self.duty = value;
        self.apply()
    }

    fn frequency(&self) -> u32 {
        self.frequency_hz
    }

    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HalError> {
        period_ns(frequency_hz)?;
        self.check_open()?;
        self.frequency_hz = frequency_hz;
        self.apply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DaemonPool;
    use crate::providers::simulation::SimulationProvider;
    use dio_common::hal::pin::{DeviceModes, PinInfo};
    use dio_common::hal::registry::DeviceRegistry;
    use std::sync::Arc;
    use std::thread;

    fn setup() -> (SimulationProvider, SoftwarePwmOutput) {
        let sim = SimulationProvider::new(Arc::new(DeviceRegistry::new()));
        let pin = PinInfo::new(5, DeviceModes::GPIO);
        let out = DigitalOutputDevice::provision(
            &sim,
            &pin,
            true,
            false,
            Arc::new(DaemonPool::with_core_threads(1)),
        )
        .unwrap();
        let pwm = SoftwarePwmOutput::new(out, 200, 0.0).unwrap();
        (sim, pwm)
    }

    #[test]
    fn extremes_are_static_levels() {
        let (sim, mut pwm) = setup();
        assert_eq!(sim.board().level(5), Some(false));
        pwm.set_value(1.0).unwrap();
        assert_eq!(sim.board().level(5), Some(true));
        let writes = sim.board().writes(5).len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sim.board().writes(5).len(), writes);
    }

    #[test]
    fn mid_duty_toggles_line() {
        let (sim, mut pwm) = setup();
        pwm.set_value(0.5).unwrap();
        thread::sleep(Duration::from_millis(50));
        pwm.set_value(0.0).unwrap();
        let writes = sim.board().writes(5);
        assert!(writes.len() > 4, "only {} writes", writes.len());
        assert_eq!(sim.board().level(5), Some(false));
    }

    #[test]
    fn invalid_duty_leaves_state() {
        let (_sim, mut pwm) = setup();
        pwm.set_value(0.25).unwrap();
        assert!(matches!(pwm.set_value(1.5), Err(HalError::InvalidArgument(_))));
        assert_eq!(pwm.get_value().unwrap(), 0.25);
        assert!(pwm.set_frequency(0).is_err());
        assert_eq!(pwm.frequency(), 200);
    }

    #[test]
    fn closed_output_rejects_updates() {
        let (_sim, mut pwm) = setup();
        pwm.close().unwrap();
        pwm.close().unwrap();
        assert!(matches!(pwm.set_value(0.5), Err(HalError::Closed(_))));
    }
}
