//! HAL Core: provider selection and device provisioning by GPIO number.
//!
//! `HalCore` owns the configuration, the pin catalog, the process-wide
//! device registry, the selected provider and the blink executor. Devices it
//! hands out are owned by the caller; dropping or closing one releases its
//! registry key.

use dio_common::config::{ConfigLoader, HalConfig};
use dio_common::hal::pin::{DeviceMode, PinCatalog, PinInfo};
use dio_common::hal::provider::{DigitalInputHandle, HalError, Provider, PwmOutputHandle};
use dio_common::hal::pwm::{check_duty, period_ns};
use dio_common::hal::registry::DeviceRegistry;
use dio_common::hal::types::{EventTrigger, PullUpDown};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::executor::{DaemonPool, TaskExecutor};
use crate::output::DigitalOutputDevice;
use crate::provider_registry::ProviderRegistry;
use crate::software_pwm::SoftwarePwmOutput;

/// Entry point for provisioning devices.
pub struct HalCore {
    config: HalConfig,
    catalog: PinCatalog,
    registry: Arc<DeviceRegistry>,
    provider: Box<dyn Provider>,
    executor: Arc<dyn TaskExecutor>,
}

impl HalCore {
    /// Validate `config` and build the provider it names from `providers`.
    ///
    /// # Errors
    /// `HalError::Config` for an invalid configuration,
    /// `HalError::ProviderNotFound` for an unknown provider name.
    pub fn new(config: HalConfig, providers: &ProviderRegistry) -> Result<Self, HalError> {
        config
            .validate()
            .map_err(|e| HalError::Config(e.to_string()))?;
        let registry = Arc::new(DeviceRegistry::new());
        let provider = providers.create(&config.provider, &config, Arc::clone(&registry))?;
        let executor = Arc::new(DaemonPool::with_core_threads(config.blink.pool_threads));
        Self::with_provider(config, provider, registry, executor)
    }

    /// Assemble a core from parts. `provider` must have been built with
    /// `registry`.
    pub fn with_provider(
        config: HalConfig,
        provider: Box<dyn Provider>,
        registry: Arc<DeviceRegistry>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, HalError> {
        let catalog = config
            .catalog()
            .map_err(|e| HalError::Config(e.to_string()))?;
        info!(
            "HalCore created: provider '{}', {} pins in catalog",
            provider.name(),
            catalog.len()
        );
        Ok(Self {
            config,
            catalog,
            registry,
            provider,
            executor,
        })
    }

    /// Load `hal.toml`.
    pub fn load_config(path: &Path) -> Result<HalConfig, HalError> {
        info!("Loading configuration from {:?}", path);
        HalConfig::load(path).map_err(|e| HalError::Config(e.to_string()))
    }

    /// Active configuration.
    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    /// Name of the selected provider.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// The selected provider.
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Board pin catalog.
    pub fn catalog(&self) -> &PinCatalog {
        &self.catalog
    }

    /// Process-wide device registry.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Catalog record for `gpio`.
    pub fn pin(&self, gpio: u32) -> Result<&PinInfo, HalError> {
        self.catalog.by_gpio_or_err(gpio)
    }

    /// Provision `gpio` as a digital input.
    pub fn provision_digital_input(
        &self,
        gpio: u32,
        pud: PullUpDown,
        trigger: EventTrigger,
    ) -> Result<Box<dyn DigitalInputHandle>, HalError> {
        let pin = self.pin(gpio)?;
        self.provider.provision_digital_input(pin, pud, trigger)
    }

    /// Provision `gpio` as a digital output, logically `initial_on`.
    pub fn provision_digital_output(
        &self,
        gpio: u32,
        active_high: bool,
        initial_on: bool,
    ) -> Result<DigitalOutputDevice, HalError> {
        let pin = self.pin(gpio)?;
        DigitalOutputDevice::provision(
            self.provider.as_ref(),
            pin,
            active_high,
            initial_on,
            Arc::clone(&self.executor),
        )
    }

    /// Provision `gpio` as a PWM output.
    ///
    /// Uses the pin's hardware channel when it has one and the provider can
    /// drive it. Otherwise, if `pwm.software_fallback` is set and the pin is
    /// a digital output, PWM is emulated on that output. `frequency_hz`
    /// defaults to `pwm.default_frequency_hz`.
    pub fn provision_pwm_output(
        &self,
        gpio: u32,
        frequency_hz: Option<u32>,
        initial_duty: f32,
    ) -> Result<Box<dyn PwmOutputHandle>, HalError> {
        let frequency_hz = frequency_hz.unwrap_or(self.config.pwm.default_frequency_hz);
        period_ns(frequency_hz)?;
        check_duty(initial_duty)?;
        let pin = self.pin(gpio)?;

        let hardware = pin.pwm.is_some()
            && pin.supports(DeviceMode::PwmOutput)
            && self.provider.supports_hardware_pwm();
        if hardware {
            return self
                .provider
                .provision_pwm_output(pin, frequency_hz, initial_duty);
        }
        if !self.config.pwm.software_fallback || !pin.supports(DeviceMode::DigitalOutput) {
            return Err(HalError::UnsupportedMode {
                gpio,
                mode: DeviceMode::PwmOutput,
            });
        }

        warn!(
            "gpio {}: no hardware PWM via '{}', using software PWM",
            gpio,
            self.provider.name()
        );
        let output = DigitalOutputDevice::provision(
            self.provider.as_ref(),
            pin,
            true,
            false,
            Arc::clone(&self.executor),
        )?;
        Ok(Box::new(SoftwarePwmOutput::new(
            output,
            frequency_hz,
            initial_duty,
        )?))
    }

    /// Shut the provider down. Devices still open are reported, not closed:
    /// their owners close them.
    pub fn shutdown(&self) -> Result<(), HalError> {
        info!("Shutdown requested");
        for key in self.registry.open_keys() {
            warn!("Device {} still open at shutdown", key);
        }
        self.provider.shutdown()
    }
}
