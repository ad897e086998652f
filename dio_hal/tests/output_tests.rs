//! Digital output device and blink loops over the simulation provider,
//! with the real daemon pool running background loops.

mod common;

use common::wait_until;
use dio_common::hal::pin::{DeviceModes, PinInfo};
use dio_common::hal::registry::DeviceRegistry;
use dio_hal::blink::{BlinkSpec, Iterations};
use dio_hal::executor::DaemonPool;
use dio_hal::output::DigitalOutputDevice;
use dio_hal::providers::simulation::SimulationProvider;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn setup(active_high: bool) -> (SimulationProvider, DigitalOutputDevice) {
    let sim = SimulationProvider::new(Arc::new(DeviceRegistry::new()));
    let out = DigitalOutputDevice::provision(
        &sim,
        &PinInfo::new(17, DeviceModes::GPIO),
        active_high,
        false,
        Arc::new(DaemonPool::with_core_threads(2)),
    )
    .unwrap();
    (sim, out)
}

fn counter() -> (Arc<AtomicUsize>, dio_hal::blink::Completion) {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&calls);
    (
        calls,
        Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

fn phase(ms: u64) -> BlinkSpec {
    BlinkSpec::new(
        Duration::from_millis(ms),
        Duration::from_millis(ms),
        Iterations::Infinite,
    )
}

#[test]
fn infinite_loop_cancelled_by_off() {
    let (sim, out) = setup(true);
    let (calls, completion) = counter();

    out.blink(phase(10), true, Some(completion)).unwrap();
    assert!(wait_until(|| sim.board().writes(17).len() >= 5));
    assert!(out.is_looping());

    out.off().unwrap();
    // one half-cycle of overrun at most
    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));
    assert!(!out.is_looping());

    let settled = sim.board().writes(17).len();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sim.board().writes(17).len(), settled);
    assert_eq!(sim.board().level(17), Some(false));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn foreground_write_wins_over_loop() {
    let (sim, out) = setup(false);
    out.blink(phase(1), true, None).unwrap();
    thread::sleep(Duration::from_millis(20));

    out.on().unwrap();
    thread::sleep(Duration::from_millis(20));
    // active low: on is physical low
    assert_eq!(sim.board().level(17), Some(false));
    assert!(out.is_on().unwrap());
}

#[test]
fn new_loop_replaces_old_one() {
    let (sim, out) = setup(true);
    let (first_calls, first) = counter();
    let (second_calls, second) = counter();

    out.blink(phase(5), true, Some(first)).unwrap();
    thread::sleep(Duration::from_millis(12));
    let spec = BlinkSpec::new(
        Duration::from_millis(5),
        Duration::from_millis(5),
        Iterations::Finite(2),
    );
    out.blink(spec, true, Some(second)).unwrap();

    assert!(wait_until(|| {
        first_calls.load(Ordering::SeqCst) == 1 && second_calls.load(Ordering::SeqCst) == 1
    }));
    assert!(wait_until(|| !out.is_looping()));
    assert_eq!(sim.board().level(17), Some(false));
}

#[test]
fn finite_background_loop_completes() {
    let (sim, out) = setup(true);
    let (calls, completion) = counter();
    let spec = BlinkSpec::new(Duration::from_millis(2), Duration::from_millis(2), Iterations::Finite(3));

    out.blink(spec, true, Some(completion)).unwrap();
    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));
    // initial off + 3 cycles
    assert_eq!(
        sim.board().writes(17),
        vec![false, true, false, true, false, true, false]
    );
}

#[test]
fn close_stops_loop_and_switches_off() {
    let (sim, out) = setup(false);
    let (calls, completion) = counter();

    out.blink(phase(5), true, Some(completion)).unwrap();
    thread::sleep(Duration::from_millis(20));
    out.close().unwrap();
    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));
    // active low: off is physical high
    assert_eq!(sim.board().level(17), Some(true));
    assert!(!sim.board().is_exported(17));
    out.close().unwrap();
}
