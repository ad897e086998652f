//! Task executors for background blink loops.
//!
//! [`DaemonPool`] is the default: an elastic pool of named worker threads fed
//! by a crossbeam channel. A submitted task goes to an idle worker if there is
//! one; otherwise a new worker is spawned and handed the task directly, so a
//! long-running loop never queues behind another. Workers beyond the core
//! count exit after sitting idle for the keep-alive period.
//!
//! [`InlineExecutor`] runs the task on the submitting thread, for tests.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dio_common::hal::provider::HalError;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run a [`Task`] asynchronously (or not).
pub trait TaskExecutor: Send + Sync {
    /// Hand `task` over for execution.
    fn submit(&self, task: Task) -> Result<(), HalError>;
}

/// Runs every task to completion inside `submit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: Task) -> Result<(), HalError> {
        run_task(task);
        Ok(())
    }
}

/// Default idle time before a non-core worker exits.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct PoolState {
    receiver: Receiver<Task>,
    /// Workers blocked on the channel minus tasks already promised to them.
    idle: AtomicUsize,
    workers: AtomicUsize,
    spawned: AtomicUsize,
    core: usize,
    keep_alive: Duration,
}

/// Elastic daemon worker pool.
///
/// Dropping the pool disconnects the channel; workers finish what they are
/// running and exit.
#[derive(Debug)]
pub struct DaemonPool {
    sender: Sender<Task>,
    state: Arc<PoolState>,
}

impl DaemonPool {
    /// Pool keeping `core` workers alive indefinitely once spawned.
    pub fn new(core: usize, keep_alive: Duration) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            state: Arc::new(PoolState {
                receiver,
                idle: AtomicUsize::new(0),
                workers: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
                core,
                keep_alive,
            }),
        }
    }

    /// Pool with [`DEFAULT_KEEP_ALIVE`].
    pub fn with_core_threads(core: usize) -> Self {
        Self::new(core, DEFAULT_KEEP_ALIVE)
    }

    /// Live worker threads.
    pub fn worker_count(&self) -> usize {
        self.state.workers.load(Ordering::SeqCst)
    }

    /// Workers waiting for a task.
    pub fn idle_count(&self) -> usize {
        self.state.idle.load(Ordering::SeqCst)
    }

    fn reserve_idle(state: &PoolState) -> bool {
        state
            .idle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn spawn_worker(&self, first: Task) -> Result<(), HalError> {
        let state = Arc::clone(&self.state);
        let core = state.workers.fetch_add(1, Ordering::SeqCst) < state.core;
        let id = state.spawned.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(format!("dio-blink-{id}"))
            .spawn(move || worker_loop(state, first, core));
        match spawned {
            Ok(_) => {
                debug!("Spawned dio-blink-{} (core: {})", id, core);
                Ok(())
            }
            Err(e) => {
                self.state.workers.fetch_sub(1, Ordering::SeqCst);
                Err(HalError::io("spawning blink worker", e))
            }
        }
    }
}

impl TaskExecutor for DaemonPool {
    fn submit(&self, task: Task) -> Result<(), HalError> {
        if Self::reserve_idle(&self.state) {
            return self.sender.send(task).map_err(|_| {
                HalError::io(
                    "submitting blink task",
                    io::Error::from(io::ErrorKind::BrokenPipe),
                )
            });
        }
        self.spawn_worker(task)
    }
}

fn worker_loop(state: Arc<PoolState>, first: Task, core: bool) {
    run_task(first);
    loop {
        state.idle.fetch_add(1, Ordering::SeqCst);
        let next = if core {
            state.receiver.recv().ok()
        } else {
            match state.receiver.recv_timeout(state.keep_alive) {
                Ok(task) => Some(task),
                Err(RecvTimeoutError::Timeout) => {
                    if DaemonPool::reserve_idle(&state) {
                        trace!("{:?} idle, exiting", thread::current().name());
                        break;
                    }
                    // a submitter already counted on this worker
                    state.receiver.recv().ok()
                }
                Err(RecvTimeoutError::Disconnected) => None,
            }
        };
        match next {
            Some(task) => run_task(task),
            None => break,
        }
    }
    state.workers.fetch_sub(1, Ordering::SeqCst);
}

fn run_task(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!(
            "Background task panicked on {:?}",
            thread::current().name().unwrap_or("<unnamed>")
        );
    }
}
