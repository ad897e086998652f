//! Simulation provider.
//!
//! Implements the full provider contract against an in-memory [`SimBoard`]
//! for development and testing without physical hardware. Exclusivity goes
//! through the same shared [`DeviceRegistry`] as every other provider.

mod board;
mod handles;

pub use board::{SimBoard, SimPwmState};
pub use handles::{SimDigitalInput, SimDigitalOutput, SimPwmOutput};

use dio_common::config::HalConfig;
use dio_common::hal::pin::{DeviceMode, PinInfo};
use dio_common::hal::provider::{
    DigitalInputHandle, DigitalOutputHandle, HalError, Provider, PwmOutputHandle,
};
use dio_common::hal::pwm::{check_duty, period_ns};
use dio_common::hal::registry::{DeviceRegistry, Registration};
use dio_common::hal::types::{DeviceKey, EventTrigger, Polarity, PullUpDown};
use std::sync::Arc;
use tracing::{debug, info};

/// Provider backed by a simulated board.
#[derive(Debug, Clone)]
pub struct SimulationProvider {
    board: Arc<SimBoard>,
    registry: Arc<DeviceRegistry>,
    hardware_pwm: bool,
}

impl SimulationProvider {
    /// Provider name, also the `DeviceKey` prefix.
    pub const NAME: &'static str = "simulation";

    /// Create a provider with a fresh board.
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        info!("Simulation provider created");
        Self {
            board: Arc::new(SimBoard::default()),
            registry,
            hardware_pwm: true,
        }
    }

    /// Report no hardware PWM support, forcing callers onto software PWM.
    pub fn without_hardware_pwm(mut self) -> Self {
        self.hardware_pwm = false;
        self
    }

    /// The simulated board, for inspection and input injection.
    pub fn board(&self) -> &Arc<SimBoard> {
        &self.board
    }

    fn register(&self, pin: &PinInfo, mode: DeviceMode) -> Result<Registration, HalError> {
        pin.require(mode)?;
        self.registry.register(DeviceKey::for_pin(Self::NAME, pin), mode)
    }
}

impl Provider for SimulationProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports_hardware_pwm(&self) -> bool {
        self.hardware_pwm
    }

    fn provision_digital_input(
        &self,
        pin: &PinInfo,
        pud: PullUpDown,
        trigger: EventTrigger,
    ) -> Result<Box<dyn DigitalInputHandle>, HalError> {
        let registration = self.register(pin, DeviceMode::DigitalInput)?;
        debug!("sim gpio {} input, pud {:?}, trigger {:?}", pin.gpio, pud, trigger);
        let input = SimDigitalInput::open(pin.gpio, Arc::clone(&self.board), registration, trigger)?;
        Ok(Box::new(input))
    }

    fn provision_digital_output(
        &self,
        pin: &PinInfo,
        initial_value: bool,
    ) -> Result<Box<dyn DigitalOutputHandle>, HalError> {
        let registration = self.register(pin, DeviceMode::DigitalOutput)?;
        debug!("sim gpio {} output, initial {}", pin.gpio, initial_value);
        let output = SimDigitalOutput::open(
            pin.gpio,
            Arc::clone(&self.board),
            registration,
            initial_value,
        )?;
        Ok(Box::new(output))
    }

    fn provision_pwm_output(
        &self,
        pin: &PinInfo,
        frequency_hz: u32,
        initial_duty: f32,
    ) -> Result<Box<dyn PwmOutputHandle>, HalError> {
        let channel = match pin.pwm {
            Some(channel) if self.hardware_pwm => channel,
            _ => {
                return Err(HalError::UnsupportedMode {
                    gpio: pin.gpio,
                    mode: DeviceMode::PwmOutput,
                });
            }
        };
        period_ns(frequency_hz)?;
        check_duty(initial_duty)?;
        let registration = self.register(pin, DeviceMode::PwmOutput)?;
        let channel_registration = self
            .registry
            .register(DeviceKey::for_pwm_channel(Self::NAME, channel), DeviceMode::PwmOutput)?;
        let pwm = SimPwmOutput::open(
            pin.gpio,
            Arc::clone(&self.board),
            registration,
            channel_registration,
            Polarity::Normal,
            frequency_hz,
            initial_duty,
        )?;
        Ok(Box::new(pwm))
    }
}

/// Factory registered under [`SimulationProvider::NAME`].
pub fn create_provider(
    _config: &HalConfig,
    registry: Arc<DeviceRegistry>,
) -> Result<Box<dyn Provider>, HalError> {
    Ok(Box::new(SimulationProvider::new(registry)))
}
