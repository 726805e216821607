//! Worker thread: the suspend / wait / select / run loop.
//!
//! Each worker owns nothing but its retirement flag. Everything it schedules
//! from lives in [`Shared`], which the pool and all workers hold by `Arc`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use tracing::{debug, trace};

use super::signal::SignalTriad;
use super::stacks::{OperationRef, PriorityStacks};
use super::stats::PoolCounters;
use crate::telemetry::{self, SpanExt};

/// Scheduling state shared by a pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub stacks: PriorityStacks,
    pub signals: SignalTriad,
    pub counters: PoolCounters,
    /// Workers spawned and not yet out of their loop.
    pub live: AtomicUsize,
    pub shut_down: AtomicBool,
}

impl Shared {
    /// Suspend or resume. The stack pause flag is flipped inside the suspend
    /// lock, so the two flags always change together. While paused the
    /// stacks hand out nothing, so work pushed after a suspend cannot start
    /// before the resume.
    pub fn set_suspended(&self, suspended: bool) {
        let stacks = &self.stacks;
        self.signals.suspended.broadcast(|flag| {
            stacks.set_paused(suspended);
            *flag = suspended;
        });
        if !suspended {
            // Workers that found the stacks paused are parked on the work
            // condition, not the suspend one.
            self.signals.wake_all_workers();
        }
    }

    /// Lift suspension for teardown while keeping the stacks paused, so
    /// retired workers leave their waits without picking up more work.
    pub fn release_for_shutdown(&self) {
        let stacks = &self.stacks;
        self.signals.suspended.broadcast(|flag| {
            stacks.set_paused(true);
            *flag = false;
        });
        self.signals.wake_all_workers();
    }

    /// Release idle-barrier waiters if nothing is pending or running.
    pub fn announce_if_idle(&self) {
        if self.stacks.is_idle() {
            self.signals.announce_idle();
        }
    }
}

/// Observable state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Suspended,
    WaitingForWork,
    Running,
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Suspended,
            1 => Self::WaitingForWork,
            2 => Self::Running,
            _ => Self::Terminated,
        }
    }
}

/// Flags shared between a worker thread and its registry entry.
#[derive(Debug)]
struct WorkerFlags {
    retired: AtomicBool,
    state: AtomicU8,
}

impl WorkerFlags {
    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Registry entry for one worker thread.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    id: u64,
    flags: Arc<WorkerFlags>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker thread named `{prefix}-{id}`.
    pub fn spawn(
        id: u64,
        shared: Arc<Shared>,
        prefix: &str,
        stack_size: usize,
    ) -> std::io::Result<Self> {
        let flags = Arc::new(WorkerFlags {
            retired: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::WaitingForWork as u8),
        });

        let mut builder = thread::Builder::new().name(format!("{prefix}-{id}"));
        if stack_size > 0 {
            builder = builder.stack_size(stack_size);
        }

        shared.live.fetch_add(1, Ordering::AcqRel);
        let worker = Worker { id, shared: Arc::clone(&shared), flags: Arc::clone(&flags) };
        match builder.spawn(move || worker.run()) {
            Ok(thread) => Ok(Self { id, flags, thread: Some(thread) }),
            Err(e) => {
                shared.live.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.flags.state.load(Ordering::Acquire))
    }

    /// Set the termination flag. The caller wakes the worker afterwards.
    pub fn retire(&self) {
        self.flags.retired.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread.as_ref().map(|t| t.thread().id())
    }

    /// Wait for the thread to exit. A no-op on the worker's own thread.
    pub fn join(mut self) {
        if self.thread_id() == Some(thread::current().id()) {
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!(worker_id = self.id, "worker thread unwound");
            }
        }
    }
}

struct Worker {
    id: u64,
    shared: Arc<Shared>,
    flags: Arc<WorkerFlags>,
}

impl Worker {
    fn run(self) {
        let span = telemetry::worker_span(self.id);
        let _entered = span.enter();
        debug!("worker started");

        let mut seen = self.shared.signals.work_generation();
        // A fresh worker tries to select immediately: work may predate it.
        let mut select_now = true;

        loop {
            if self.wait_while_suspended() {
                select_now = true;
            }
            if self.flags.is_retired() {
                break;
            }
            if !select_now {
                self.wait_for_work(&mut seen);
                if self.flags.is_retired() {
                    break;
                }
                if self.shared.signals.is_suspended() {
                    continue;
                }
            }

            select_now = match self.shared.stacks.pop_best_ready() {
                Some(op) => {
                    self.execute(op);
                    true
                }
                None => false,
            };
        }

        self.flags.set_state(WorkerState::Terminated);
        let live = self.shared.live.fetch_sub(1, Ordering::AcqRel) - 1;
        telemetry::record_workers(live);
        // The last unit may have finished on this thread right before retiring.
        self.shared.announce_if_idle();
        debug!(live, "worker terminated");
    }

    /// Park while the pool is suspended. Returns true if it parked.
    fn wait_while_suspended(&self) -> bool {
        let flags = &self.flags;
        self.shared.signals.suspended.wait_while(|suspended| {
            let park = *suspended && !flags.is_retired();
            if park {
                flags.set_state(WorkerState::Suspended);
            }
            park
        })
    }

    /// Announce idleness if nothing is left, then park until the work
    /// generation moves past `seen` or this worker is retired.
    fn wait_for_work(&self, seen: &mut u64) {
        self.flags.set_state(WorkerState::WaitingForWork);
        self.shared.announce_if_idle();

        let flags = &self.flags;
        self.shared.signals.work.wait_while(|generation| {
            if *generation != *seen {
                *seen = *generation;
                return false;
            }
            !flags.is_retired()
        });
    }

    fn execute(&self, op: OperationRef) {
        self.flags.set_state(WorkerState::Running);
        let span = telemetry::operation_span(op.priority(), op.is_cancelled());
        let started = Instant::now();

        let outcome = span.in_scope(|| panic::catch_unwind(AssertUnwindSafe(|| op.execute())));
        let panicked = outcome.is_err();
        span.record_outcome(panicked, started.elapsed());
        drop(op);

        self.shared.counters.record_executed(panicked);
        telemetry::record_executed(panicked);
        self.shared.stacks.finish();
        trace!(panicked, "operation finished");

        // In-flight can only reach zero here; a worker that parks on
        // suspension next would otherwise never announce it.
        self.shared.announce_if_idle();

        // Completion can make dependants ready; hand them to another idle
        // worker rather than leaving them for this one alone.
        if self.shared.stacks.has_any_work() {
            self.shared.signals.work_arrived(1);
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
