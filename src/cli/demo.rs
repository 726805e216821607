//! `tierstack demo`: push a mixed-tier workload through a pool.
//!
//! Exercises every tier, a dependency chain, a suspend/resume window and a
//! cancelled batch, then prints pool stats as JSON.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::scheduler::{BlockOperation, OperationRef, PoolConfig, PoolError, Priority, StackPool};

/// Workload shape for the demo.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub pool: PoolConfig,
    /// Operations in the main batch.
    pub operations: usize,
    /// Simulated work per operation.
    pub work: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            pool: PoolConfig::with_threads(4),
            operations: 100,
            work: Duration::from_millis(1),
        }
    }
}

/// Outcome counters returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoReport {
    pub completed: usize,
    /// Operations executed after cancellation, which did no work.
    pub skipped_cancelled: usize,
}

fn workload_op(tier: Priority, work: Duration, completed: &Arc<AtomicUsize>) -> BlockOperation {
    let completed = Arc::clone(completed);
    BlockOperation::with_priority(tier, move |cancel| {
        thread::sleep(work);
        if !cancel.is_cancelled() {
            completed.fetch_add(1, Ordering::Relaxed);
        }
    })
}

/// Run the demo workload and return what happened.
pub fn run_demo(options: &DemoOptions) -> Result<DemoReport, PoolError> {
    let pool = StackPool::with_config(options.pool.clone())?;
    let completed = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    // Main batch spread across all tiers.
    let batch: Vec<OperationRef> = (0..options.operations)
        .map(|i| {
            let tier = Priority::ALL[i % Priority::COUNT];
            Arc::new(workload_op(tier, options.work, &completed)) as OperationRef
        })
        .collect();
    pool.submit_batch(batch, true)?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "main batch drained");

    // Dependency chain: each link waits for the previous one. Links go in
    // last-first so the runnable head ends up on top of the stack; an unready
    // top would hide the rest of the tier.
    let mut links: Vec<Arc<BlockOperation>> = Vec::new();
    for _ in 0..5 {
        let link = Arc::new(workload_op(Priority::High, options.work, &completed));
        if let Some(prev) = links.last() {
            link.add_dependency(Arc::clone(prev));
        }
        links.push(link);
    }
    for link in links.iter().rev() {
        pool.submit(link.clone())?;
    }
    pool.wait_until_idle();
    info!("dependency chain drained");

    // Suspended window: queued work is cancelled before it can start.
    pool.set_suspended(true);
    for _ in 0..10 {
        pool.submit_last(Arc::new(workload_op(Priority::Normal, options.work, &completed)))?;
    }
    pool.cancel_all();
    pool.set_suspended(false);
    pool.wait_until_idle();
    info!("cancelled window drained");

    let stats = pool.stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Failed to serialize stats: {e}"),
    }
    pool.shutdown();

    let completed = completed.load(Ordering::Relaxed);
    Ok(DemoReport {
        completed,
        skipped_cancelled: (stats.executed as usize).saturating_sub(completed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_completes_and_skips_cancelled() {
        let options = DemoOptions {
            pool: PoolConfig::with_threads(2),
            operations: 20,
            work: Duration::ZERO,
        };
        let report = run_demo(&options).unwrap();
        assert_eq!(report.completed, 25);
        assert_eq!(report.skipped_cancelled, 10);
    }
}
