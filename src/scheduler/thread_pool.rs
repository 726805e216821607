//! The pool manager: worker registry plus the public scheduling surface.
//!
//! Operations are pushed onto per-tier LIFO stacks and picked up by a
//! resizable set of OS threads. See [`StackPool`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::pool::{clamp_concurrency, PoolConfig};
use super::priority::Priority;
use super::stacks::OperationRef;
use super::stats::PoolStats;
use super::worker::{Shared, WorkerHandle, WorkerState};
use crate::telemetry;

/// Live and retired workers, guarded by one lock so resizes never race.
#[derive(Debug, Default)]
struct WorkerRegistry {
    /// Live workers in spawn order; shrinking retires from the end.
    workers: Vec<WorkerHandle>,
    /// Retired workers whose threads may still be finishing an operation.
    retired: Vec<WorkerHandle>,
    next_id: u64,
}

impl WorkerRegistry {
    /// Join retired threads that have already exited.
    fn reap(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) =
            self.retired.drain(..).partition(WorkerHandle::is_finished);
        self.retired = pending;
        done.into_iter().for_each(WorkerHandle::join);
    }
}

/// Tiered LIFO operation scheduler backed by a resizable thread pool.
///
/// Within a tier the most recently submitted ready operation runs first;
/// lower tiers always yield to higher ones. Dropping the pool shuts it down.
///
/// ```no_run
/// use std::sync::Arc;
/// use tierstack::scheduler::{BlockOperation, Priority, StackPool};
///
/// let pool = StackPool::new(2)?;
/// pool.submit(Arc::new(BlockOperation::with_priority(Priority::High, |cancel| {
///     if cancel.is_cancelled() {
///         return;
///     }
///     println!("hello from a worker");
/// })))?;
/// pool.wait_until_idle();
/// # Ok::<(), tierstack::scheduler::PoolError>(())
/// ```
pub struct StackPool {
    shared: Arc<Shared>,
    registry: Mutex<WorkerRegistry>,
    config: PoolConfig,
}

impl std::fmt::Debug for StackPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackPool")
            .field("concurrency", &self.concurrency())
            .field("pending", &self.pending())
            .field("suspended", &self.is_suspended())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl StackPool {
    /// Create a pool and spawn `concurrency` workers (clamped to at least 1).
    pub fn new(concurrency: usize) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::with_threads(concurrency))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        let pool = Self {
            shared: Arc::new(Shared::default()),
            registry: Mutex::new(WorkerRegistry::default()),
            config,
        };
        {
            let mut registry = pool.registry.lock();
            pool.spawn_workers(&mut registry, pool.config.worker_threads.get())?;
        }
        info!(
            concurrency = pool.config.worker_threads.get(),
            prefix = %pool.config.thread_name_prefix,
            "stack pool started"
        );
        Ok(pool)
    }

    /// Submit an operation at its own tier.
    pub fn submit(&self, op: OperationRef) -> Result<(), PoolError> {
        let tier = op.priority();
        self.push(op, tier)
    }

    /// Submit an operation at the lowest tier, whatever it reports.
    pub fn submit_last(&self, op: OperationRef) -> Result<(), PoolError> {
        self.push(op, Priority::VeryLow)
    }

    /// Submit every operation at its own tier.
    ///
    /// With `await_completion` the call blocks until the whole pool is idle,
    /// which includes work submitted concurrently by other callers.
    pub fn submit_batch<I>(&self, ops: I, await_completion: bool) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = OperationRef>,
    {
        self.ensure_running()?;
        let ops: Vec<OperationRef> = ops.into_iter().collect();
        let mut per_tier = [0usize; Priority::COUNT];
        for op in &ops {
            per_tier[op.priority().stack_index()] += 1;
        }

        let pushed = self.shared.stacks.push_all(ops);
        self.shared.counters.record_submitted(pushed);
        for (tier, count) in Priority::ALL.iter().zip(per_tier) {
            if count > 0 {
                telemetry::record_submitted(*tier, count);
            }
        }
        self.shared.signals.work_arrived(pushed);
        telemetry::record_pending(self.shared.stacks.len());
        debug!(pushed, await_completion, "batch submitted");

        if await_completion {
            self.wait_until_idle();
        }
        Ok(())
    }

    /// Block until nothing is pending or executing.
    ///
    /// Waits indefinitely if pending work never becomes ready or the pool
    /// stays suspended.
    pub fn wait_until_idle(&self) {
        let stacks = &self.shared.stacks;
        self.shared.signals.idle.wait_while(|_| !stacks.is_idle());
    }

    /// Flag every pending operation as cancelled. Cancelled operations stay
    /// queued and are still executed; their bodies are expected to no-op.
    pub fn cancel_all(&self) {
        let snapshot = self.shared.stacks.snapshot();
        for op in &snapshot {
            op.cancel();
        }
        telemetry::record_cancel_requests(snapshot.len());
        debug!(cancelled = snapshot.len(), "cancel requested for pending operations");
    }

    /// Wake one parked worker so it re-probes readiness. Needed only when
    /// readiness changed for reasons outside this pool.
    pub fn wake(&self) {
        self.shared.signals.work_arrived(1);
    }

    /// Target worker count.
    pub fn concurrency(&self) -> usize {
        self.registry.lock().workers.len()
    }

    /// Resize the pool. Values below 1 are clamped to 1.
    ///
    /// Growing spawns new workers. Shrinking retires the most recently added
    /// workers; each exits after its current operation, if any.
    pub fn set_concurrency(&self, concurrency: usize) -> Result<(), PoolError> {
        let target = clamp_concurrency(concurrency).get();
        let mut registry = self.registry.lock();
        self.ensure_running()?;
        registry.reap();

        let current = registry.workers.len();
        if target > current {
            self.spawn_workers(&mut registry, target - current)?;
        } else if target < current {
            let retiring = registry.workers.split_off(target);
            for worker in &retiring {
                worker.retire();
            }
            self.shared.counters.record_retired(retiring.len());
            registry.retired.extend(retiring);
            self.shared.signals.wake_all_workers();
            self.shared.signals.nudge_suspended();
        }
        info!(from = current, to = target, "concurrency changed");
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.signals.is_suspended()
    }

    /// Suspend or resume the pool. Running operations are not interrupted;
    /// no operation starts between a suspend and the matching resume.
    pub fn set_suspended(&self, suspended: bool) {
        self.shared.set_suspended(suspended);
        telemetry::record_suspended(suspended);
        info!(suspended, "suspension changed");
    }

    /// Operations waiting on the stacks.
    pub fn pending(&self) -> usize {
        self.shared.stacks.len()
    }

    pub fn pending_by_tier(&self) -> [usize; Priority::COUNT] {
        self.shared.stacks.len_by_tier()
    }

    /// Worker threads still inside their loop, including retired workers
    /// finishing an operation.
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// `(worker id, state)` for each live, non-retired worker.
    pub fn worker_states(&self) -> Vec<(u64, WorkerState)> {
        self.registry
            .lock()
            .workers
            .iter()
            .map(|w| (w.id(), w.state()))
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            concurrency: self.concurrency(),
            live_workers: self.live_workers(),
            pending: self.pending(),
            pending_by_tier: self.pending_by_tier(),
            in_flight: self.shared.stacks.in_flight(),
            suspended: self.is_suspended(),
            ..Default::default()
        };
        self.shared.counters.fill(&mut stats);
        stats
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::Acquire)
    }

    /// Stop the pool. Idempotent.
    ///
    /// Pending operations are dropped without running. Workers finish the
    /// operation they are executing, then exit; this call joins them unless
    /// it is made from one of the pool's own workers.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        // Nothing is handed out from here on, even to a worker that has not
        // yet seen its retirement.
        self.shared.stacks.set_paused(true);

        let handles: Vec<WorkerHandle> = {
            let mut registry = self.registry.lock();
            let mut handles: Vec<WorkerHandle> = registry.workers.drain(..).collect();
            handles.append(&mut registry.retired);
            handles
        };
        for worker in &handles {
            worker.retire();
        }

        let discarded = self.shared.stacks.clear();
        self.shared.counters.record_discarded(discarded);
        telemetry::record_discarded(discarded);

        self.shared.release_for_shutdown();
        self.shared.announce_if_idle();

        for worker in handles {
            worker.join();
        }
        telemetry::record_pending(0);
        info!(discarded, "stack pool shut down");
    }

    fn push(&self, op: OperationRef, tier: Priority) -> Result<(), PoolError> {
        self.ensure_running()?;
        self.shared.stacks.push(op, tier);
        self.shared.counters.record_submitted(1);
        self.shared.signals.work_arrived(1);
        telemetry::record_submitted(tier, 1);
        telemetry::record_pending(self.shared.stacks.len());
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), PoolError> {
        if self.is_shut_down() {
            Err(PoolError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn spawn_workers(&self, registry: &mut WorkerRegistry, count: usize) -> Result<(), PoolError> {
        for _ in 0..count {
            registry.next_id += 1;
            let worker = WorkerHandle::spawn(
                registry.next_id,
                Arc::clone(&self.shared),
                &self.config.thread_name_prefix,
                self.config.stack_size,
            )
            .map_err(PoolError::Spawn)?;
            registry.workers.push(worker);
        }
        telemetry::record_workers(self.live_workers());
        Ok(())
    }
}

impl Drop for StackPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Errors for pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Stack pool is shut down")]
    ShutDown,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
