//! Blink scheduling primitives.
//!
//! A blink loop drives a line active for `on_time`, inactive for `off_time`,
//! and repeats. Cancellation is cooperative: the loop re-checks its
//! [`LoopControl`] immediately before every physical write, so a cancelled
//! loop stops within one half-cycle.
//!
//! Each loop runs under a generation number. Starting a loop bumps the
//! generation, which cancels whatever ran before; a stale loop finishing late
//! can only clear its own generation, never a newer one.

use dio_common::hal::provider::HalError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Count value selecting an endless loop.
pub const INFINITE_ITERATIONS: i64 = -1;

/// How many on/off cycles a loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iterations {
    /// Exactly this many cycles (0 runs none).
    Finite(u32),
    /// Until cancelled.
    Infinite,
}

impl Iterations {
    /// Map a caller-facing count: [`INFINITE_ITERATIONS`] or a number in
    /// `0..=u32::MAX`.
    pub fn from_count(count: i64) -> Result<Self, HalError> {
        if count == INFINITE_ITERATIONS {
            return Ok(Self::Infinite);
        }
        u32::try_from(count).map(Self::Finite).map_err(|_| {
            HalError::InvalidArgument(format!(
                "iteration count {count} (0..={} or {INFINITE_ITERATIONS} for infinite)",
                u32::MAX
            ))
        })
    }

    fn allows(self, done: u32) -> bool {
        match self {
            Self::Finite(n) => done < n,
            Self::Infinite => true,
        }
    }
}

/// Parameters of one blink loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkSpec {
    /// Active phase length.
    pub on_time: Duration,
    /// Inactive phase length.
    pub off_time: Duration,
    /// Cycle count.
    pub iterations: Iterations,
}

impl BlinkSpec {
    /// Blink with the given phase lengths and count.
    pub fn new(on_time: Duration, off_time: Duration, iterations: Iterations) -> Self {
        Self {
            on_time,
            off_time,
            iterations,
        }
    }

    /// Blink from phase lengths in (fractional) seconds.
    pub fn from_secs_f32(on: f32, off: f32, iterations: Iterations) -> Result<Self, HalError> {
        let on_time = Duration::try_from_secs_f32(on)
            .map_err(|e| HalError::InvalidArgument(format!("on time {on}: {e}")))?;
        let off_time = Duration::try_from_secs_f32(off)
            .map_err(|e| HalError::InvalidArgument(format!("off time {off}: {e}")))?;
        Ok(Self::new(on_time, off_time, iterations))
    }
}

/// Called once when a loop ends, naturally or by cancellation.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one started loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopToken(u64);

/// Per-device loop ownership.
///
/// `running` holds the generation of the active loop, 0 when none runs.
#[derive(Debug, Default)]
pub struct LoopControl {
    running: AtomicU64,
    generation: AtomicU64,
}

impl LoopControl {
    /// Create an idle control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new loop, cancelling any previous one.
    pub fn begin(&self) -> LoopToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(generation, Ordering::SeqCst);
        LoopToken(generation)
    }

    /// Cancel whatever loop is running. Does not wait for it.
    pub fn cancel(&self) {
        self.running.store(0, Ordering::SeqCst);
    }

    /// Returns true while `token`'s loop has not been cancelled or replaced.
    pub fn is_current(&self, token: LoopToken) -> bool {
        self.running.load(Ordering::SeqCst) == token.0
    }

    /// Mark `token`'s loop as ended. A newer loop is left untouched.
    pub fn finish(&self, token: LoopToken) {
        let _ = self
            .running
            .compare_exchange(token.0, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Returns true if some loop is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) != 0
    }
}

/// Run the on/off cycles of `spec`.
///
/// `write(active)` performs one physical write and returns `Ok(false)` if the
/// loop has been cancelled, in which case nothing was written and the loop
/// returns at once.
pub fn run_cycles(
    spec: &BlinkSpec,
    mut write: impl FnMut(bool) -> Result<bool, HalError>,
) -> Result<(), HalError> {
    let mut done: u32 = 0;
    while spec.iterations.allows(done) {
        if !write(true)? {
            return Ok(());
        }
        thread::sleep(spec.on_time);
        if !write(false)? {
            return Ok(());
        }
        thread::sleep(spec.off_time);
        done = done.saturating_add(1);
        trace!("blink cycle {} done", done);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_counts() {
        assert_eq!(Iterations::from_count(-1).unwrap(), Iterations::Infinite);
        assert_eq!(Iterations::from_count(0).unwrap(), Iterations::Finite(0));
        assert_eq!(Iterations::from_count(3).unwrap(), Iterations::Finite(3));
        assert!(Iterations::from_count(-2).is_err());
        assert_eq!(
            Iterations::from_count(i64::from(u32::MAX)).unwrap(),
            Iterations::Finite(u32::MAX)
        );
        assert!(matches!(
            Iterations::from_count(i64::from(u32::MAX) + 1),
            Err(HalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn negative_phase_is_rejected() {
        assert!(BlinkSpec::from_secs_f32(-0.1, 0.1, Iterations::Infinite).is_err());
        let spec = BlinkSpec::from_secs_f32(0.25, 0.5, Iterations::Finite(1)).unwrap();
        assert_eq!(spec.on_time, Duration::from_millis(250));
    }

    #[test]
    fn finite_loop_alternates() {
        let spec = BlinkSpec::new(Duration::ZERO, Duration::ZERO, Iterations::Finite(2));
        let mut writes = Vec::new();
        run_cycles(&spec, |v| {
            writes.push(v);
            Ok(true)
        })
        .unwrap();
        assert_eq!(writes, vec![true, false, true, false]);
    }

    #[test]
    fn zero_iterations_write_nothing() {
        let spec = BlinkSpec::new(Duration::ZERO, Duration::ZERO, Iterations::Finite(0));
        run_cycles(&spec, |_| panic!("no write expected")).unwrap();
    }

    #[test]
    fn cancelled_mid_cycle_skips_off_write() {
        let spec = BlinkSpec::new(Duration::ZERO, Duration::ZERO, Iterations::Infinite);
        let mut writes = 0;
        run_cycles(&spec, |_| {
            writes += 1;
            Ok(writes < 3)
        })
        .unwrap();
        assert_eq!(writes, 3);
    }

    #[test]
    fn write_error_ends_loop() {
        let spec = BlinkSpec::new(Duration::ZERO, Duration::ZERO, Iterations::Infinite);
        let err = run_cycles(&spec, |_| Err(HalError::InvalidArgument("x".into())));
        assert!(err.is_err());
    }

    #[test]
    fn stale_loop_cannot_clear_newer_one() {
        let control = LoopControl::new();
        let first = control.begin();
        let second = control.begin();
        assert!(!control.is_current(first));
        control.finish(first);
        assert!(control.is_current(second));
        control.cancel();
        assert!(!control.is_running());
    }
}
