//! In-memory board model backing the simulation provider.
//!
//! Each line keeps its level, the most recent [`WRITE_HISTORY`] physical
//! writes made to it, and the state of an attached PWM channel. The PWM model applies the same rules as the
//! kernel: duty may never exceed the period, and a channel cannot be enabled
//! without a period.

use dio_common::hal::provider::HalError;
use dio_common::hal::types::Polarity;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Writes kept per line; older entries are dropped first.
pub const WRITE_HISTORY: usize = 1024;

/// Snapshot of a simulated PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimPwmState {
    /// Period [ns]; 0 until first written.
    pub period_ns: u64,
    /// Duty [ns].
    pub duty_ns: u64,
    /// Output polarity.
    pub polarity: Polarity,
    /// Output enabled.
    pub enabled: bool,
}

#[derive(Debug, Default)]
struct SimLine {
    level: bool,
    writes: VecDeque<bool>,
    exported: bool,
    fail_io: bool,
    pwm: Option<SimPwmState>,
}

/// Shared state of all simulated lines.
#[derive(Debug, Default)]
pub struct SimBoard {
    lines: Mutex<HashMap<u32, SimLine>>,
}

impl SimBoard {
    fn lines(&self) -> MutexGuard<'_, HashMap<u32, SimLine>> {
        self.lines.lock().expect("simulation board lock poisoned")
    }

    fn with_line<T>(
        &self,
        gpio: u32,
        op: &str,
        f: impl FnOnce(&mut SimLine) -> Result<T, HalError>,
    ) -> Result<T, HalError> {
        let mut lines = self.lines();
        let line = lines.entry(gpio).or_default();
        if line.fail_io {
            return Err(HalError::io(
                format!("simulated gpio {gpio}: {op}"),
                io::Error::other("injected I/O failure"),
            ));
        }
        f(line)
    }

    pub(super) fn export(&self, gpio: u32) -> Result<(), HalError> {
        self.with_line(gpio, "export", |line| {
            line.exported = true;
            Ok(())
        })
    }

    pub(super) fn unexport(&self, gpio: u32) {
        if let Some(line) = self.lines().get_mut(&gpio) {
            line.exported = false;
            line.pwm = None;
        }
    }

    pub(super) fn read(&self, gpio: u32) -> Result<bool, HalError> {
        self.with_line(gpio, "read", |line| Ok(line.level))
    }

    pub(super) fn write(&self, gpio: u32, level: bool) -> Result<(), HalError> {
        self.with_line(gpio, "write", |line| {
            trace!("sim gpio {} <- {}", gpio, level);
            line.level = level;
            if line.writes.len() == WRITE_HISTORY {
                line.writes.pop_front();
            }
            line.writes.push_back(level);
            Ok(())
        })
    }

    pub(super) fn pwm_configure(
        &self,
        gpio: u32,
        f: impl FnOnce(&mut SimPwmState) -> Result<(), HalError>,
    ) -> Result<(), HalError> {
        self.with_line(gpio, "pwm", |line| {
            let mut next = line.pwm.unwrap_or_default();
            f(&mut next)?;
            if next.duty_ns > next.period_ns {
                return Err(HalError::io(
                    format!("simulated pwm {gpio}"),
                    io::Error::from(io::ErrorKind::InvalidInput),
                ));
            }
            if next.enabled && next.period_ns == 0 {
                return Err(HalError::io(
                    format!("simulated pwm {gpio}: enable without period"),
                    io::Error::from(io::ErrorKind::InvalidInput),
                ));
            }
            line.pwm = Some(next);
            Ok(())
        })
    }

    pub(super) fn pwm_duty(&self, gpio: u32) -> Result<u64, HalError> {
        self.with_line(gpio, "pwm read", |line| {
            Ok(line.pwm.map(|p| p.duty_ns).unwrap_or_default())
        })
    }

    /// Current level of `gpio`, if the line was ever touched.
    pub fn level(&self, gpio: u32) -> Option<bool> {
        self.lines().get(&gpio).map(|l| l.level)
    }

    /// Recent physical levels written to `gpio`, oldest first.
    pub fn writes(&self, gpio: u32) -> Vec<bool> {
        self.lines()
            .get(&gpio)
            .map(|l| l.writes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drive an input line from outside.
    pub fn set_input(&self, gpio: u32, level: bool) {
        self.lines().entry(gpio).or_default().level = level;
    }

    /// Make every subsequent access to `gpio` fail (or succeed again).
    pub fn inject_io_failure(&self, gpio: u32, fail: bool) {
        self.lines().entry(gpio).or_default().fail_io = fail;
    }

    /// Returns true while `gpio` is exported.
    pub fn is_exported(&self, gpio: u32) -> bool {
        self.lines().get(&gpio).is_some_and(|l| l.exported)
    }

    /// PWM channel attached to `gpio`, if one is configured.
    pub fn pwm_state(&self, gpio: u32) -> Option<SimPwmState> {
        self.lines().get(&gpio).and_then(|l| l.pwm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_recorded_in_order() {
        let board = SimBoard::default();
        board.write(5, true).unwrap();
        board.write(5, false).unwrap();
        assert_eq!(board.writes(5), vec![true, false]);
        assert_eq!(board.level(5), Some(false));
        assert!(board.writes(6).is_empty());
    }

    #[test]
    fn write_history_is_bounded() {
        let board = SimBoard::default();
        for i in 0..WRITE_HISTORY + 100 {
            board.write(5, i % 3 == 0).unwrap();
        }
        let writes = board.writes(5);
        assert_eq!(writes.len(), WRITE_HISTORY);
        assert_eq!(writes.last(), Some(&((WRITE_HISTORY + 99) % 3 == 0)));
        assert_eq!(writes.first(), Some(&(100 % 3 == 0)));
    }

    #[test]
    fn injected_failure_blocks_access() {
        let board = SimBoard::default();
        board.inject_io_failure(5, true);
        assert!(matches!(board.write(5, true), Err(HalError::Io { .. })));
        board.inject_io_failure(5, false);
        board.write(5, true).unwrap();
    }

    #[test]
    fn pwm_rejects_duty_above_period() {
        let board = SimBoard::default();
        board
            .pwm_configure(18, |p| {
                p.period_ns = 1000;
                p.duty_ns = 500;
                Ok(())
            })
            .unwrap();
        assert!(
            board
                .pwm_configure(18, |p| {
                    p.duty_ns = 2000;
                    Ok(())
                })
                .is_err()
        );
        assert_eq!(board.pwm_state(18).unwrap().duty_ns, 500);
    }
}
