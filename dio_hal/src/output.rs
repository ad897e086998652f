//! Digital output device: polarity, on/off/toggle and blink.
//!
//! [`DigitalOutputDevice`] wraps a provider's [`DigitalOutputHandle`] and
//! speaks logical on/off. With `active_high = false` "on" drives the line low.
//!
//! Every foreground operation cancels any running blink loop before its own
//! write. The loop checks for cancellation while holding the delegate lock,
//! so once `on()`, `off()` or `set_on()` has cancelled it, no later loop write
//! can land on top of the foreground one.

use dio_common::hal::pin::PinInfo;
use dio_common::hal::provider::{DigitalOutputHandle, HalError, Provider};
use dio_common::hal::types::DeviceKey;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::blink::{self, BlinkSpec, Completion, LoopControl, LoopToken};
use crate::executor::TaskExecutor;

struct OutputShared {
    key: DeviceKey,
    gpio: u32,
    active_high: bool,
    control: LoopControl,
    delegate: Mutex<Box<dyn DigitalOutputHandle>>,
}

impl OutputShared {
    fn delegate(&self) -> MutexGuard<'_, Box<dyn DigitalOutputHandle>> {
        self.delegate.lock().expect("output delegate lock poisoned")
    }

    fn write_logical(&self, on: bool) -> Result<(), HalError> {
        self.delegate().set_value(on == self.active_high)
    }

    /// One loop write, skipped if `token` has been cancelled.
    fn loop_write(&self, token: LoopToken, on: bool) -> Result<bool, HalError> {
        let mut delegate = self.delegate();
        if !self.control.is_current(token) {
            return Ok(false);
        }
        delegate.set_value(on == self.active_high)?;
        Ok(true)
    }

    fn run_blink(
        &self,
        token: LoopToken,
        spec: BlinkSpec,
        completion: Option<Completion>,
    ) -> Result<(), HalError> {
        debug!("{}: blink {:?}", self.key, spec);
        let result = blink::run_cycles(&spec, |on| self.loop_write(token, on));
        self.control.finish(token);
        if let Some(completion) = completion {
            completion();
        }
        result
    }
}

/// Logical on/off output with blink support.
pub struct DigitalOutputDevice {
    shared: Arc<OutputShared>,
    executor: Arc<dyn TaskExecutor>,
}

impl DigitalOutputDevice {
    /// Wrap an already provisioned handle.
    pub fn new(
        delegate: Box<dyn DigitalOutputHandle>,
        active_high: bool,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            shared: Arc::new(OutputShared {
                key: delegate.key().clone(),
                gpio: delegate.gpio(),
                active_high,
                control: LoopControl::new(),
                delegate: Mutex::new(delegate),
            }),
            executor,
        }
    }

    /// Provision `pin` through `provider`, logically `initial_on`.
    pub fn provision(
        provider: &dyn Provider,
        pin: &PinInfo,
        active_high: bool,
        initial_on: bool,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, HalError> {
        let delegate = provider.provision_digital_output(pin, active_high == initial_on)?;
        Ok(Self::new(delegate, active_high, executor))
    }

    /// Registry key of the underlying line.
    pub fn key(&self) -> &DeviceKey {
        &self.shared.key
    }

    /// GPIO number.
    pub fn gpio(&self) -> u32 {
        self.shared.gpio
    }

    /// Whether "on" drives the line high.
    pub fn active_high(&self) -> bool {
        self.shared.active_high
    }

    /// Returns false once closed.
    pub fn is_open(&self) -> bool {
        self.shared.delegate().is_open()
    }

    /// Returns true while a blink loop is active.
    pub fn is_looping(&self) -> bool {
        self.shared.control.is_running()
    }

    /// Turn on.
    pub fn on(&self) -> Result<(), HalError> {
        self.set_on(true)
    }

    /// Turn off.
    pub fn off(&self) -> Result<(), HalError> {
        self.set_on(false)
    }

    /// Cancel any loop, then drive the line to logical `on`.
    pub fn set_on(&self, on: bool) -> Result<(), HalError> {
        self.shared.control.cancel();
        self.shared.write_logical(on)
    }

    /// Cancel any loop, then invert the current level.
    pub fn toggle(&self) -> Result<(), HalError> {
        self.shared.control.cancel();
        let mut delegate = self.shared.delegate();
        let level = delegate.get_value()?;
        delegate.set_value(!level)
    }

    /// Logical state read back from the line.
    pub fn is_on(&self) -> Result<bool, HalError> {
        let level = self.shared.delegate().get_value()?;
        Ok(level == self.shared.active_high)
    }

    /// Physical write with neither loop cancellation nor polarity mapping.
    pub fn set_value_unsafe(&self, level: bool) -> Result<(), HalError> {
        self.shared.delegate().set_value(level)
    }

    /// Physical write of `value != 0`, same rules as
    /// [`set_value_unsafe`](Self::set_value_unsafe).
    pub fn set_value(&self, value: f32) -> Result<(), HalError> {
        self.set_value_unsafe(value != 0.0)
    }

    /// Start a blink loop, cancelling any previous one.
    ///
    /// In the background the loop is submitted to the executor and this
    /// returns at once; otherwise it returns when the loop ends. `completion`
    /// runs exactly once when the loop ends, whether it ran out or was
    /// cancelled. It is not run if the loop could not be started.
    pub fn blink(
        &self,
        spec: BlinkSpec,
        background: bool,
        completion: Option<Completion>,
    ) -> Result<(), HalError> {
        if !self.is_open() {
            return Err(HalError::Closed(self.shared.key.clone()));
        }
        let token = self.shared.control.begin();
        if !background {
            return self.shared.run_blink(token, spec, completion);
        }

        let shared = Arc::clone(&self.shared);
        let submitted = self.executor.submit(Box::new(move || {
            if let Err(e) = shared.run_blink(token, spec, completion) {
                warn!("{}: blink loop ended: {}", shared.key, e);
            }
        }));
        if submitted.is_err() {
            self.shared.control.finish(token);
        }
        submitted
    }

    /// Cancel any loop, force the line off and release it. Idempotent.
    pub fn close(&self) -> Result<(), HalError> {
        self.shared.control.cancel();
        let mut delegate = self.shared.delegate();
        if !delegate.is_open() {
            return Ok(());
        }
        debug!("Closing {}", self.shared.key);
        if let Err(e) = delegate.set_value(!self.shared.active_high) {
            warn!("{}: failed to switch off before close: {}", self.shared.key, e);
        }
        delegate.close()
    }
}

impl Drop for DigitalOutputDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}: close on drop failed: {}", self.shared.key, e);
        }
    }
}

static_assertions::assert_impl_all!(DigitalOutputDevice: Send, Sync);
