//! Operation capability set consumed by the scheduler.
//!
//! The pool never looks inside an operation: it asks for a tier, polls
//! readiness, and calls `execute` exactly once. `BlockOperation` is the
//! closure-backed implementation used by the CLI, tests, and callers that do
//! not need their own type.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::priority::Priority;

/// A unit of work the pool can schedule.
///
/// Cancellation is advisory: a cancelled operation stays on its stack and is
/// still executed, so `execute` must check `is_cancelled` and return early.
pub trait Operation: Send + Sync {
    /// Tier the operation is admitted at.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Whether the operation may run now. Re-evaluated on every dequeue
    /// attempt while it sits on top of its stack.
    ///
    /// Called with the pool's stack lock held. It must be cheap, must not
    /// panic, and must not call back into the pool (`submit`, `pending`,
    /// `stats`, ...): the lock is not reentrant and such a call deadlocks.
    fn is_ready(&self) -> bool {
        true
    }

    fn is_cancelled(&self) -> bool;

    /// Request cancellation. Must be cheap and must not block.
    fn cancel(&self);

    /// Run the body on the calling worker thread.
    fn execute(&self);
}

/// Shared cancellation flag handed to an operation body.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

type Body = Box<dyn FnOnce(&CancelFlag) + Send + 'static>;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Closure-backed operation with optional dependencies.
///
/// Ready once every dependency has finished. A body that observes
/// cancellation should return promptly; a cancelled operation whose body has
/// not started yet skips the body entirely.
pub struct BlockOperation {
    id: u64,
    priority: Priority,
    body: Mutex<Option<Body>>,
    cancelled: CancelFlag,
    finished: AtomicBool,
    dependencies: Mutex<Vec<Arc<BlockOperation>>>,
}

impl std::fmt::Debug for BlockOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockOperation")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("cancelled", &self.cancelled.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl BlockOperation {
    /// Create an operation at `Priority::Normal`.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(&CancelFlag) + Send + 'static,
    {
        Self::with_priority(Priority::Normal, body)
    }

    pub fn with_priority<F>(priority: Priority, body: F) -> Self
    where
        F: FnOnce(&CancelFlag) + Send + 'static,
    {
        Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            priority,
            body: Mutex::new(Some(Box::new(body))),
            cancelled: CancelFlag::new(),
            finished: AtomicBool::new(false),
            dependencies: Mutex::new(Vec::new()),
        }
    }

    /// Process-unique identifier, assigned at construction.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block readiness until `dependency` has finished.
    pub fn add_dependency(&self, dependency: Arc<BlockOperation>) {
        self.dependencies.lock().push(dependency);
    }

    /// True once `execute` has returned (or unwound).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Flag shared with the body, for cancelling from outside the pool.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancelled.clone()
    }
}

/// Marks the operation finished even if the body unwinds.
struct FinishGuard<'a>(&'a AtomicBool);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Operation for BlockOperation {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn is_ready(&self) -> bool {
        self.dependencies.lock().iter().all(|dep| dep.is_finished())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    fn cancel(&self) {
        self.cancelled.cancel();
    }

    fn execute(&self) {
        let _finish = FinishGuard(&self.finished);
        let body = self.body.lock().take();
        if self.cancelled.is_cancelled() {
            return;
        }
        if let Some(body) = body {
            body(&self.cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn body_runs_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let op = BlockOperation::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        op.execute();
        op.execute();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(op.is_finished());
    }

    #[test]
    fn cancelled_before_start_skips_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let op = BlockOperation::new(move |_| ran_clone.store(true, Ordering::SeqCst));

        op.cancel();
        op.execute();

        assert!(!ran.load(Ordering::SeqCst));
        assert!(op.is_cancelled());
        assert!(op.is_finished());
    }

    #[test]
    fn readiness_follows_dependencies() {
        let dep = Arc::new(BlockOperation::new(|_| {}));
        let op = BlockOperation::new(|_| {});
        op.add_dependency(dep.clone());

        assert!(!op.is_ready());
        dep.execute();
        assert!(op.is_ready());
    }

    #[test]
    fn cancel_flag_is_shared_with_body() {
        let op = BlockOperation::new(|_| {});
        let flag = op.cancel_flag();
        flag.cancel();
        assert!(op.is_cancelled());
    }

    #[test]
    fn ids_are_unique() {
        let a = BlockOperation::new(|_| {});
        let b = BlockOperation::new(|_| {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn finished_even_if_body_panics() {
        let op = BlockOperation::new(|_| panic!("boom"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op.execute()));
        assert!(result.is_err());
        assert!(op.is_finished());
    }
}
