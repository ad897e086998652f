//! Device Registry: process-wide exclusivity table.
//!
//! Every provider built for a process shares one `DeviceRegistry` and
//! registers a key before touching the kernel or bus. Check-and-insert runs
//! under a single lock, so concurrent provisioning of the same key has
//! exactly one winner and the losers never reach hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::hal::pin::DeviceMode;
use crate::hal::provider::HalError;
use crate::hal::types::DeviceKey;

/// One row of the registry table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Exclusivity key.
    pub key: DeviceKey,
    /// Capability the device was provisioned for.
    pub mode: DeviceMode,
    /// False once the owning device has closed.
    pub open: bool,
}

/// Table of provisioned devices, at most one open entry per key.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: Mutex<HashMap<DeviceKey, RegistryEntry>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<DeviceKey, RegistryEntry>> {
        self.entries.lock().expect("device registry lock poisoned")
    }

    /// Claim `key` for a device of capability `mode`.
    ///
    /// The returned [`Registration`] releases the key when dropped, so a
    /// provider that bails out of bring-up early unregisters automatically.
    ///
    /// # Errors
    /// `HalError::AlreadyOpen` if an open entry already exists for `key`.
    pub fn register(
        self: &Arc<Self>,
        key: DeviceKey,
        mode: DeviceMode,
    ) -> Result<Registration, HalError> {
        let mut table = self.table();
        if table.get(&key).is_some_and(|e| e.open) {
            return Err(HalError::AlreadyOpen(key));
        }
        table.insert(
            key.clone(),
            RegistryEntry {
                key: key.clone(),
                mode,
                open: true,
            },
        );
        drop(table);

        debug!("Registered {} ({})", key, mode);
        Ok(Registration {
            registry: Arc::clone(self),
            key,
            released: false,
        })
    }

    /// Mark `key` closed. Unknown or already-closed keys are ignored.
    pub fn unregister(&self, key: &DeviceKey) {
        if let Some(entry) = self.table().get_mut(key) {
            if entry.open {
                entry.open = false;
                debug!("Unregistered {}", key);
                return;
            }
        }
        trace!("unregister({}) ignored, not open", key);
    }

    /// Returns true if an open entry exists for `key`.
    pub fn is_open(&self, key: &DeviceKey) -> bool {
        self.table().get(key).is_some_and(|e| e.open)
    }

    /// Snapshot of the entry for `key`, open or closed.
    pub fn entry(&self, key: &DeviceKey) -> Option<RegistryEntry> {
        self.table().get(key).cloned()
    }

    /// Number of open entries.
    pub fn open_count(&self) -> usize {
        self.table().values().filter(|e| e.open).count()
    }

    /// Keys of all open entries, sorted.
    pub fn open_keys(&self) -> Vec<DeviceKey> {
        let mut keys: Vec<DeviceKey> = self
            .table()
            .values()
            .filter(|e| e.open)
            .map(|e| e.key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// Ownership token for a registered key.
///
/// Held by the device handle for its whole life. `release()` (or drop)
/// unregisters the key exactly once.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<DeviceRegistry>,
    key: DeviceKey,
    released: bool,
}

impl Registration {
    /// Key this registration owns.
    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    /// Unregister the key. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.unregister(&self.key);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

static_assertions::assert_impl_all!(DeviceRegistry: Send, Sync);
static_assertions::assert_impl_all!(Registration: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn key(gpio: u32) -> DeviceKey {
        DeviceKey::for_gpio("test", gpio)
    }

    #[test]
    fn register_and_release() {
        let reg = Arc::new(DeviceRegistry::new());
        let mut r = reg.register(key(1), DeviceMode::DigitalOutput).unwrap();
        assert!(reg.is_open(&key(1)));
        assert_eq!(reg.open_count(), 1);

        r.release();
        assert!(!reg.is_open(&key(1)));
        assert_eq!(reg.entry(&key(1)).map(|e| e.open), Some(false));
        // second release is a no-op
        r.release();
        assert_eq!(reg.open_count(), 0);
    }

    #[test]
    fn duplicate_key_rejected() {
        let reg = Arc::new(DeviceRegistry::new());
        let _held = reg.register(key(7), DeviceMode::DigitalOutput).unwrap();
        let err = reg.register(key(7), DeviceMode::PwmOutput).unwrap_err();
        assert!(matches!(err, HalError::AlreadyOpen(k) if k == key(7)));
        // the original entry is untouched
        assert_eq!(reg.entry(&key(7)).map(|e| e.mode), Some(DeviceMode::DigitalOutput));
    }

    #[test]
    fn closed_key_can_be_reopened() {
        let reg = Arc::new(DeviceRegistry::new());
        drop(reg.register(key(3), DeviceMode::DigitalInput).unwrap());
        assert!(!reg.is_open(&key(3)));
        let _again = reg.register(key(3), DeviceMode::DigitalOutput).unwrap();
        assert!(reg.is_open(&key(3)));
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let reg = DeviceRegistry::new();
        reg.unregister(&key(42));
        assert_eq!(reg.open_count(), 0);
        assert!(reg.entry(&key(42)).is_none());
    }

    #[test]
    fn concurrent_register_has_one_winner() {
        const THREADS: usize = 16;
        let reg = Arc::new(DeviceRegistry::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    reg.register(key(18), DeviceMode::DigitalOutput)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(HalError::AlreadyOpen(_))))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, THREADS - 1);
        assert_eq!(reg.open_count(), 1);
    }

    #[test]
    fn open_keys_sorted() {
        let reg = Arc::new(DeviceRegistry::new());
        let _b = reg.register(key(2), DeviceMode::DigitalOutput).unwrap();
        let _a = reg.register(key(1), DeviceMode::DigitalOutput).unwrap();
        assert_eq!(reg.open_keys(), vec![key(1), key(2)]);
    }
}
