//! Ordering, barrier, resize, cancellation and suspension behavior of the pool.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tierstack::scheduler::{
    BlockOperation, Operation, OperationRef, PoolError, Priority, StackPool, WorkerState,
};

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recording(log: &Log, tag: &'static str, tier: Priority) -> OperationRef {
    let log = Arc::clone(log);
    Arc::new(BlockOperation::with_priority(tier, move |_| {
        log.lock().unwrap().push(tag);
    }))
}

/// Operation that reports what it saw when executed.
struct Probe {
    tier: Priority,
    cancelled: AtomicBool,
    saw_cancelled: AtomicBool,
    runs: AtomicUsize,
}

impl Probe {
    fn new(tier: Priority) -> Arc<Self> {
        Arc::new(Self {
            tier,
            cancelled: AtomicBool::new(false),
            saw_cancelled: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
        })
    }
}

impl Operation for Probe {
    fn priority(&self) -> Priority {
        self.tier
    }
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
    fn execute(&self) {
        self.saw_cancelled.store(self.is_cancelled(), Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn mixed_tiers_run_lifo_within_tier() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();

    pool.set_suspended(true);
    pool.submit(recording(&log, "P1", Priority::VeryHigh)).unwrap();
    pool.submit(recording(&log, "P2", Priority::VeryHigh)).unwrap();
    pool.submit(recording(&log, "P3", Priority::VeryLow)).unwrap();
    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(*log.lock().unwrap(), vec!["P2", "P1", "P3"]);
}

#[test]
fn same_tier_is_strictly_lifo() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();

    pool.set_suspended(true);
    for tag in ["a", "b", "c", "d"] {
        pool.submit(recording(&log, tag, Priority::Normal)).unwrap();
    }
    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(*log.lock().unwrap(), vec!["d", "c", "b", "a"]);
}

#[test]
fn urgent_tier_submitted_later_runs_first() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();

    pool.set_suspended(true);
    pool.submit(recording(&log, "low", Priority::Low)).unwrap();
    pool.submit(recording(&log, "normal", Priority::Normal)).unwrap();
    pool.submit(recording(&log, "very_high", Priority::VeryHigh)).unwrap();
    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(*log.lock().unwrap(), vec!["very_high", "normal", "low"]);
}

#[test]
fn submit_last_runs_after_everything_else() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();

    pool.set_suspended(true);
    pool.submit_last(recording(&log, "forced_last", Priority::VeryHigh)).unwrap();
    pool.submit(recording(&log, "low", Priority::Low)).unwrap();
    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(*log.lock().unwrap(), vec!["low", "forced_last"]);
}

#[test]
fn batch_with_await_returns_after_drain() {
    let pool = StackPool::new(3).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let ops: Vec<OperationRef> = (0..30)
        .map(|i| {
            let counter = counter.clone();
            Arc::new(BlockOperation::with_priority(Priority::from((i % 5) as u8), move |_| {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            })) as OperationRef
        })
        .collect();
    pool.submit_batch(ops, true).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 30);
    assert_eq!(pool.pending(), 0);
}

#[test]
fn batch_await_on_idle_pool_returns_immediately() {
    let pool = StackPool::new(2).unwrap();
    let started = Instant::now();
    pool.submit_batch(Vec::new(), true).unwrap();
    pool.wait_until_idle();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn shrinking_retires_exactly_the_difference() {
    let pool = StackPool::new(5).unwrap();
    assert!(wait_until(Duration::from_secs(2), || pool.live_workers() == 5));

    pool.set_concurrency(2).unwrap();

    assert_eq!(pool.concurrency(), 2);
    assert!(wait_until(Duration::from_secs(2), || pool.live_workers() == 2));
    assert_eq!(pool.stats().workers_retired, 3);
    let ids: Vec<u64> = pool.worker_states().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn resizing_under_load_neither_drops_nor_repeats() {
    let pool = StackPool::new(6).unwrap();
    let probes: Vec<Arc<Probe>> = (0..300).map(|i| Probe::new(Priority::from((i % 5) as u8))).collect();

    for (i, probe) in probes.iter().enumerate() {
        pool.submit(probe.clone()).unwrap();
        if i == 100 {
            pool.set_concurrency(2).unwrap();
        }
        if i == 200 {
            pool.set_concurrency(4).unwrap();
        }
    }
    pool.wait_until_idle();

    assert!(probes.iter().all(|p| p.runs.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.stats().executed, 300);
    assert_eq!(pool.concurrency(), 4);
}

#[test]
fn growing_adds_workers() {
    let pool = StackPool::new(1).unwrap();
    pool.set_concurrency(4).unwrap();
    assert_eq!(pool.concurrency(), 4);
    assert!(wait_until(Duration::from_secs(2), || pool.live_workers() == 4));
}

#[test]
fn zero_concurrency_clamps_to_one() {
    let pool = StackPool::new(3).unwrap();
    pool.set_concurrency(0).unwrap();
    assert_eq!(pool.concurrency(), 1);
    assert!(wait_until(Duration::from_secs(2), || pool.live_workers() == 1));
}

#[test]
fn cancel_all_marks_pending_and_they_still_run() {
    let pool = StackPool::new(2).unwrap();
    let probes: Vec<Arc<Probe>> = (0..8).map(|_| Probe::new(Priority::Normal)).collect();

    pool.set_suspended(true);
    for probe in &probes {
        pool.submit(probe.clone()).unwrap();
    }
    pool.cancel_all();
    assert_eq!(pool.pending(), 8);

    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(pool.pending(), 0);
    for probe in &probes {
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
        assert!(probe.saw_cancelled.load(Ordering::SeqCst));
    }
}

#[test]
fn cancel_all_skips_block_operation_bodies() {
    let pool = StackPool::new(1).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    pool.set_suspended(true);
    let ops: Vec<Arc<BlockOperation>> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            Arc::new(BlockOperation::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        })
        .collect();
    for op in &ops {
        pool.submit(op.clone()).unwrap();
    }
    pool.cancel_all();
    pool.set_suspended(false);
    pool.wait_until_idle();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(ops.iter().all(|op| op.is_finished() && op.is_cancelled()));
}

#[test]
fn suspension_halts_and_resume_keeps_order() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();

    pool.set_suspended(true);
    assert!(pool.is_suspended());
    assert!(wait_until(Duration::from_secs(2), || {
        pool.worker_states().iter().all(|(_, s)| *s != WorkerState::Running)
    }));

    pool.submit(recording(&log, "n1", Priority::Normal)).unwrap();
    pool.submit(recording(&log, "h1", Priority::High)).unwrap();
    pool.submit(recording(&log, "n2", Priority::Normal)).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(pool.pending(), 3);

    pool.set_suspended(false);
    pool.wait_until_idle();
    assert!(!pool.is_suspended());
    assert_eq!(*log.lock().unwrap(), vec!["h1", "n2", "n1"]);
}

#[test]
fn unready_top_blocks_its_tier_until_ready() {
    let pool = StackPool::new(1).unwrap();
    let log: Log = Arc::default();
    let gate = Arc::new(BlockOperation::new(|_| {}));

    let waiting = {
        let log = log.clone();
        Arc::new(BlockOperation::with_priority(Priority::High, move |_| {
            log.lock().unwrap().push("waiting");
        }))
    };
    waiting.add_dependency(gate.clone());

    pool.set_suspended(true);
    pool.submit(recording(&log, "below", Priority::High)).unwrap();
    pool.submit(waiting.clone()).unwrap();
    pool.submit(recording(&log, "other_tier", Priority::Low)).unwrap();
    pool.set_suspended(false);

    assert!(wait_until(Duration::from_secs(2), || log.lock().unwrap().len() == 1));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(*log.lock().unwrap(), vec!["other_tier"]);
    assert_eq!(pool.pending(), 2);

    // The gate lives outside the pool, so its completion needs a wake.
    gate.execute();
    pool.wake();
    pool.wait_until_idle();
    assert_eq!(*log.lock().unwrap(), vec!["other_tier", "waiting", "below"]);
}

#[test]
fn dependency_finished_in_pool_releases_dependant() {
    let pool = StackPool::new(2).unwrap();
    let log: Log = Arc::default();

    let first = {
        let log = log.clone();
        Arc::new(BlockOperation::with_priority(Priority::Low, move |_| {
            thread::sleep(Duration::from_millis(10));
            log.lock().unwrap().push("first");
        }))
    };
    let second = {
        let log = log.clone();
        Arc::new(BlockOperation::with_priority(Priority::VeryHigh, move |_| {
            log.lock().unwrap().push("second");
        }))
    };
    second.add_dependency(first.clone());

    pool.submit(second.clone()).unwrap();
    pool.submit(first.clone()).unwrap();
    pool.wait_until_idle();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn panicking_operation_is_contained() {
    let pool = StackPool::new(1).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    pool.submit(Arc::new(BlockOperation::new(|_| panic!("deliberate failure")))).unwrap();
    pool.wait_until_idle();

    let after = counter.clone();
    pool.submit(Arc::new(BlockOperation::new(move |_| {
        after.fetch_add(1, Ordering::SeqCst);
    })))
    .unwrap();
    pool.wait_until_idle();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let stats = pool.stats();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.executed, 2);
    assert_eq!(pool.live_workers(), 1);
}

#[test]
fn destroyed_pool_discards_pending_and_rejects_submits() {
    let pool = StackPool::new(2).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    pool.set_suspended(true);
    for _ in 0..3 {
        let counter = counter.clone();
        pool.submit(Arc::new(BlockOperation::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();
    }
    pool.shutdown();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(pool.pending(), 0);
    assert_eq!(pool.stats().discarded, 3);

    let rejected = pool.submit(Arc::new(BlockOperation::new(|_| {})));
    assert!(matches!(rejected, Err(PoolError::ShutDown)));
    assert!(matches!(pool.submit_last(Arc::new(BlockOperation::new(|_| {}))), Err(PoolError::ShutDown)));
    assert!(matches!(pool.submit_batch(Vec::new(), false), Err(PoolError::ShutDown)));
}

#[test]
fn idle_barrier_releases_when_suspended_mid_run() {
    let pool = Arc::new(StackPool::new(1).unwrap());
    let (started_tx, started_rx) = mpsc::channel();

    pool.submit(Arc::new(BlockOperation::new(move |_| {
        started_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
    })))
    .unwrap();
    started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    pool.set_suspended(true);

    let (done_tx, done_rx) = mpsc::channel();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            pool.wait_until_idle();
            done_tx.send(()).unwrap();
        })
    };

    assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    assert!(pool.is_suspended());
    assert_eq!(pool.pending(), 0);
    assert_eq!(pool.stats().in_flight, 0);
    waiter.join().unwrap();
    pool.set_suspended(false);
}

#[test]
fn racing_suspend_and_resume_leave_pool_usable() {
    let pool = Arc::new(StackPool::new(2).unwrap());

    let togglers: Vec<_> = [true, false]
        .into_iter()
        .map(|first| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for i in 0..2_000 {
                    pool.set_suspended((i % 2 == 0) == first);
                }
            })
        })
        .collect();
    for toggler in togglers {
        toggler.join().unwrap();
    }

    pool.set_suspended(false);
    assert!(!pool.is_suspended());

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    pool.submit(Arc::new(BlockOperation::new(move |_| flag.store(true, Ordering::SeqCst))))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || ran.load(Ordering::SeqCst)));
    pool.wait_until_idle();
    assert_eq!(pool.pending(), 0);
}
