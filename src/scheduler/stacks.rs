//! Priority stack set: one LIFO stack per tier behind a single lock.

use std::sync::Arc;

use parking_lot::Mutex;

use super::operation::Operation;
use super::priority::Priority;

/// Shared handle to a scheduled operation.
pub type OperationRef = Arc<dyn Operation>;

#[derive(Default)]
struct StackState {
    stacks: [Vec<OperationRef>; Priority::COUNT],
    /// Operations popped and not yet reported finished.
    in_flight: usize,
    /// While set, nothing is handed out.
    paused: bool,
}

impl StackState {
    fn pending(&self) -> usize {
        self.stacks.iter().map(Vec::len).sum()
    }
}

/// Five stacks indexed by tier, index 0 most urgent.
///
/// Every read and write happens under one mutex, and no method blocks while
/// holding it beyond the readiness probe of at most one operation per tier.
#[derive(Default)]
pub struct PriorityStacks {
    state: Mutex<StackState>,
}

impl PriorityStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` to the top of the stack for `tier`.
    pub fn push(&self, op: OperationRef, tier: Priority) {
        self.state.lock().stacks[tier.stack_index()].push(op);
    }

    /// Append every operation at its own tier under one lock acquisition.
    pub fn push_all<I>(&self, ops: I) -> usize
    where
        I: IntoIterator<Item = OperationRef>,
    {
        let mut state = self.state.lock();
        let mut pushed = 0;
        for op in ops {
            let idx = op.priority().stack_index();
            state.stacks[idx].push(op);
            pushed += 1;
        }
        pushed
    }

    /// Remove and return the best ready operation.
    ///
    /// Stacks are scanned from tier 0. Only the top of each stack is probed:
    /// an unready top hides everything below it until it becomes ready or is
    /// covered by a newer push. A returned operation counts as in flight until
    /// [`finish`](Self::finish) is called. Returns `None` while paused.
    ///
    /// `is_ready` runs under the stack lock; see [`Operation::is_ready`].
    pub fn pop_best_ready(&self) -> Option<OperationRef> {
        let mut state = self.state.lock();
        if state.paused {
            return None;
        }
        let idx = state
            .stacks
            .iter()
            .position(|stack| stack.last().map_or(false, |top| top.is_ready()))?;
        let op = state.stacks[idx].pop()?;
        state.in_flight += 1;
        Some(op)
    }

    /// Report that an operation returned by `pop_best_ready` has finished.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Stop or restart handing out operations. Pushes are still accepted.
    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// True if any stack holds an operation, ready or not.
    pub fn has_any_work(&self) -> bool {
        self.state.lock().stacks.iter().any(|stack| !stack.is_empty())
    }

    /// True when nothing is pending and nothing is executing.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.in_flight == 0 && state.pending() == 0
    }

    /// Clone of every pending operation, tier 0 first, bottom to top.
    pub fn snapshot(&self) -> Vec<OperationRef> {
        let state = self.state.lock();
        state.stacks.iter().flatten().cloned().collect()
    }

    /// Total pending operations.
    pub fn len(&self) -> usize {
        self.state.lock().pending()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_any_work()
    }

    pub fn len_by_tier(&self) -> [usize; Priority::COUNT] {
        let state = self.state.lock();
        let mut depths = [0; Priority::COUNT];
        for (depth, stack) in depths.iter_mut().zip(state.stacks.iter()) {
            *depth = stack.len();
        }
        depths
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Drop every pending operation without running it. Returns the count.
    pub fn clear(&self) -> usize {
        let drained: Vec<OperationRef> = {
            let mut state = self.state.lock();
            let drained = state.stacks.iter_mut().flat_map(|stack| stack.drain(..)).collect();
            drained
        };
        // Operations are dropped outside the lock.
        drained.len()
    }
}

impl std::fmt::Debug for PriorityStacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityStacks")
            .field("depths", &self.len_by_tier())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
