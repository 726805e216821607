//! The three conditions that coordinate producers, workers and waiters.
//!
//! Each condition owns its own lock and guards only its own state, so a
//! worker parked on suspension is never disturbed by work arriving and vice
//! versa. A condition lock may be held while the stack lock is taken briefly
//! to evaluate a predicate; the stack lock is never held while acquiring a
//! condition lock.

use parking_lot::{Condvar, Mutex};

/// A mutex-protected value paired with a condition variable.
#[derive(Debug, Default)]
pub struct Condition<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Condition<T> {
    pub fn new(value: T) -> Self {
        Self { state: Mutex::new(value), cond: Condvar::new() }
    }

    /// Read or update the value without notifying anyone.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.state.lock())
    }

    /// Update the value and wake one waiter.
    pub fn signal(&self, f: impl FnOnce(&mut T)) {
        let mut state = self.state.lock();
        f(&mut *state);
        self.cond.notify_one();
    }

    /// Update the value and wake every waiter.
    pub fn broadcast(&self, f: impl FnOnce(&mut T)) {
        let mut state = self.state.lock();
        f(&mut *state);
        self.cond.notify_all();
    }

    /// Block while `condition` holds. Returns true if the caller actually
    /// had to wait.
    pub fn wait_while(&self, mut condition: impl FnMut(&mut T) -> bool) -> bool {
        let mut state = self.state.lock();
        if !condition(&mut *state) {
            return false;
        }
        self.cond.wait_while(&mut state, condition);
        true
    }
}

/// Work-available, all-work-completed and suspended conditions.
#[derive(Debug, Default)]
pub struct SignalTriad {
    /// Generation counter bumped on every push or wake request. Workers wait
    /// for it to move past the value they last saw, so a notify that lands
    /// while no worker is parked is not lost.
    pub work: Condition<u64>,
    /// Broadcast when a worker about to park finds the pool idle.
    pub idle: Condition<()>,
    /// Global suspend flag.
    pub suspended: Condition<bool>,
}

impl SignalTriad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `count` new units of work, waking one parked worker for each.
    pub fn work_arrived(&self, count: usize) {
        if count == 0 {
            return;
        }
        if count == 1 {
            self.work.signal(|generation| *generation = generation.wrapping_add(1));
            return;
        }
        self.work.with(|generation| *generation = generation.wrapping_add(count as u64));
        for _ in 0..count {
            self.work.signal(|_| {});
        }
    }

    /// Wake every parked worker so each re-checks its termination flag.
    pub fn wake_all_workers(&self) {
        self.work.broadcast(|generation| *generation = generation.wrapping_add(1));
    }

    pub fn work_generation(&self) -> u64 {
        self.work.with(|generation| *generation)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.with(|suspended| *suspended)
    }

    /// Wake workers parked on suspension without changing the flag, so a
    /// retired worker can observe its retirement and exit.
    pub fn nudge_suspended(&self) {
        self.suspended.broadcast(|_| {});
    }

    pub fn announce_idle(&self) {
        self.idle.broadcast(|_| {});
    }
}
