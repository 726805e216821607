//! Pool statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub submitted: u64,
    pub executed: u64,
    /// Executions that unwound instead of returning.
    pub panicked: u64,
    /// Pending operations dropped by shutdown.
    pub discarded: u64,
    pub workers_retired: u64,
    pub concurrency: usize,
    pub live_workers: usize,
    pub pending: usize,
    /// Pending depth per tier, most urgent first.
    pub pending_by_tier: [usize; Priority::COUNT],
    pub in_flight: usize,
    pub suspended: bool,
}

/// Monotonic counters shared by the pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    submitted: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    workers_retired: AtomicU64,
}

impl PoolCounters {
    pub fn record_submitted(&self, count: usize) {
        self.submitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_executed(&self, panicked: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_retired(&self, count: usize) {
        self.workers_retired.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Fill the counter fields of `stats`.
    pub fn fill(&self, stats: &mut PoolStats) {
        stats.submitted = self.submitted.load(Ordering::Relaxed);
        stats.executed = self.executed.load(Ordering::Relaxed);
        stats.panicked = self.panicked.load(Ordering::Relaxed);
        stats.discarded = self.discarded.load(Ordering::Relaxed);
        stats.workers_retired = self.workers_retired.load(Ordering::Relaxed);
    }
}
