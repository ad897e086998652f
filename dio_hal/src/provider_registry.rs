//! Provider registry.
//!
//! Maps provider names to factories. Constructed at startup, populated via
//! `register()`, and consulted once to build the selected provider. No global
//! state.

use dio_common::config::HalConfig;
use dio_common::hal::provider::{HalError, Provider, ProviderFactory};
use dio_common::hal::registry::DeviceRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::providers::{simulation, sysfs};

/// Registry of available providers.
pub struct ProviderRegistry {
    factories: HashMap<&'static str, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the providers shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        reg.register(sysfs::SysfsProvider::NAME, sysfs::create_provider);
        reg.register(simulation::SimulationProvider::NAME, simulation::create_provider);
        reg
    }

    /// Register a provider factory.
    ///
    /// # Panics
    /// Panics if a provider with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: ProviderFactory) {
        if self.factories.contains_key(name) {
            panic!("Provider '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a provider factory by name.
    pub fn get_factory(&self, name: &str) -> Option<ProviderFactory> {
        self.factories.get(name).copied()
    }

    /// Build the provider called `name`.
    ///
    /// # Errors
    /// `HalError::ProviderNotFound` if no provider with that name is
    /// registered, or whatever the factory returns.
    pub fn create(
        &self,
        name: &str,
        config: &HalConfig,
        registry: Arc<DeviceRegistry>,
    ) -> Result<Box<dyn Provider>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::ProviderNotFound(name.to_string()))?;
        let provider = factory(config, registry)?;
        info!("Provider '{}' selected", provider.name());
        Ok(provider)
    }

    /// Names of all registered providers, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_factory(
        _config: &HalConfig,
        _registry: Arc<DeviceRegistry>,
    ) -> Result<Box<dyn Provider>, HalError> {
        Err(HalError::Config("no bus".into()))
    }

    #[test]
    fn builtin_providers_are_listed() {
        assert_eq!(ProviderRegistry::with_builtin().list(), vec!["simulation", "sysfs"]);
    }

    #[test]
    fn create_by_name() {
        let reg = ProviderRegistry::with_builtin();
        let provider = reg
            .create("simulation", &HalConfig::default(), Arc::new(DeviceRegistry::new()))
            .unwrap();
        assert_eq!(provider.name(), "simulation");
    }

    #[test]
    fn unknown_provider() {
        let reg = ProviderRegistry::new();
        let result = reg.create("firmata", &HalConfig::default(), Arc::new(DeviceRegistry::new()));
        assert!(matches!(result, Err(HalError::ProviderNotFound(_))));
    }

    #[test]
    fn factory_error_is_returned() {
        let mut reg = ProviderRegistry::new();
        reg.register("broken", failing_factory);
        let result = reg.create("broken", &HalConfig::default(), Arc::new(DeviceRegistry::new()));
        assert!(matches!(result, Err(HalError::Config(_))));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_panics() {
        let mut reg = ProviderRegistry::new();
        reg.register("dup", failing_factory);
        reg.register("dup", failing_factory);
    }
}
