//! Sysfs GPIO lines: `/sys/class/gpio/gpio<N>/{direction,value,edge}`.

use dio_common::consts::{DIRECTION_FILE, EDGE_FILE, VALUE_FILE};
use dio_common::hal::provider::{
    DeviceHandle, DigitalInputHandle, DigitalOutputHandle, HalError,
};
use dio_common::hal::registry::Registration;
use dio_common::hal::types::{DeviceKey, Direction, EventTrigger};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::attr::{AttrFile, write_attr};
use super::export::SysfsExporter;

/// Export `gpio` and set its direction.
///
/// A failed direction write unexports the line before the error is returned.
fn export_gpio(
    exporter: &SysfsExporter,
    gpio: u32,
    direction: Direction,
) -> Result<PathBuf, HalError> {
    debug!("export_gpio({}, {})", gpio, direction);
    let dir = exporter.export(gpio, DIRECTION_FILE)?;
    if let Err(e) = write_attr(&dir.join(DIRECTION_FILE), direction.sysfs_value()) {
        exporter.unexport_quietly(gpio);
        return Err(e);
    }
    Ok(dir)
}

/// State common to both line directions.
#[derive(Debug)]
struct GpioLine {
    gpio: u32,
    exporter: SysfsExporter,
    registration: Registration,
    value: Option<AttrFile>,
}

impl GpioLine {
    fn open(
        gpio: u32,
        exporter: SysfsExporter,
        registration: Registration,
        dir: PathBuf,
    ) -> Result<Self, HalError> {
        match AttrFile::open(dir.join(VALUE_FILE)) {
            Ok(value) => Ok(Self {
                gpio,
                exporter,
                registration,
                value: Some(value),
            }),
            Err(e) => {
                exporter.unexport_quietly(gpio);
                Err(e)
            }
        }
    }

    fn value_file(&mut self) -> Result<&mut AttrFile, HalError> {
        match self.value.as_mut() {
            Some(value) => Ok(value),
            None => Err(HalError::Closed(self.registration.key().clone())),
        }
    }

    fn read(&mut self) -> Result<bool, HalError> {
        let result = self.value_file()?.read().and_then(|raw| match raw.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(HalError::io(
                format!("gpio {} value", self.gpio),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected value {other:?}"),
                ),
            )),
        });
        self.close_on_error(result)
    }

    fn write(&mut self, value: bool) -> Result<(), HalError> {
        let result = self.value_file()?.write(if value { "1" } else { "0" });
        self.close_on_error(result)
    }

    /// A failed node access leaves the line unusable: close it, then surface
    /// the original error.
    fn close_on_error<T>(&mut self, result: Result<T, HalError>) -> Result<T, HalError> {
        if result.is_err() {
            warn!("gpio {}: I/O failure, closing line", self.gpio);
            let _ = self.teardown();
        }
        result
    }

    fn is_open(&self) -> bool {
        self.value.is_some()
    }

    fn teardown(&mut self) -> Result<(), HalError> {
        if self.value.take().is_none() {
            return Ok(());
        }
        let result = self.exporter.unexport(self.gpio);
        if let Err(e) = &result {
            warn!("gpio {}: unexport failed: {}", self.gpio, e);
        }
        self.registration.release();
        result
    }
}

/// Sysfs digital output line.
#[derive(Debug)]
pub struct SysfsDigitalOutput {
    line: GpioLine,
}

impl SysfsDigitalOutput {
    pub(super) fn open(
        gpio: u32,
        exporter: SysfsExporter,
        registration: Registration,
        initial_value: bool,
    ) -> Result<Self, HalError> {
        let dir = export_gpio(&exporter, gpio, Direction::Out)?;
        let mut out = Self {
            line: GpioLine::open(gpio, exporter, registration, dir)?,
        };
        // a failed write closes the line (unexport + release)
        out.line.write(initial_value)?;
        Ok(out)
    }
}

impl DeviceHandle for SysfsDigitalOutput {
    fn key(&self) -> &DeviceKey {
        self.line.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.line.gpio
    }

    fn is_open(&self) -> bool {
        self.line.is_open()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.line.teardown()
    }
}

impl DigitalOutputHandle for SysfsDigitalOutput {
    fn get_value(&mut self) -> Result<bool, HalError> {
        self.line.read()
    }

    fn set_value(&mut self, value: bool) -> Result<(), HalError> {
        self.line.write(value)
    }
}

impl Drop for SysfsDigitalOutput {
    fn drop(&mut self) {
        let _ = self.line.teardown();
    }
}

/// Sysfs digital input line.
#[derive(Debug)]
pub struct SysfsDigitalInput {
    line: GpioLine,
    trigger: EventTrigger,
}

impl SysfsDigitalInput {
    pub(super) fn open(
        gpio: u32,
        exporter: SysfsExporter,
        registration: Registration,
        trigger: EventTrigger,
    ) -> Result<Self, HalError> {
        let dir = export_gpio(&exporter, gpio, Direction::In)?;
        if trigger != EventTrigger::None {
            if let Err(e) = write_attr(&dir.join(EDGE_FILE), trigger.sysfs_value()) {
                exporter.unexport_quietly(gpio);
                return Err(e);
            }
        }
        Ok(Self {
            line: GpioLine::open(gpio, exporter, registration, dir)?,
            trigger,
        })
    }

    /// Edge the line was configured with.
    pub fn trigger(&self) -> EventTrigger {
        self.trigger
    }
}

impl DeviceHandle for SysfsDigitalInput {
    fn key(&self) -> &DeviceKey {
        self.line.registration.key()
    }

    fn gpio(&self) -> u32 {
        self.line.gpio
    }

    fn is_open(&self) -> bool {
        self.line.is_open()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.line.teardown()
    }
}

impl DigitalInputHandle for SysfsDigitalInput {
    fn get_value(&mut self) -> Result<bool, HalError> {
        self.line.read()
    }
}

impl Drop for SysfsDigitalInput {
    fn drop(&mut self) {
        let _ = self.line.teardown();
    }
}
