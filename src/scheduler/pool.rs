//! Worker pool configuration.

use std::num::NonZeroUsize;

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "tierstack-worker";

/// Configuration for a [`StackPool`](super::StackPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial number of worker threads.
    pub worker_threads: NonZeroUsize,
    /// Stack size per worker thread in bytes (0 = platform default).
    pub stack_size: usize,
    /// Worker threads are named `{prefix}-{worker_id}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: NonZeroUsize::MIN,
            stack_size: 0,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// Config with a specific thread count; zero is clamped to one.
    pub fn with_threads(count: usize) -> Self {
        Self {
            worker_threads: clamp_concurrency(count),
            ..Default::default()
        }
    }

    /// One worker per logical CPU.
    pub fn per_cpu() -> Self {
        Self::with_threads(num_cpus::get())
    }
}

/// Clamp a requested worker count to at least one.
pub fn clamp_concurrency(count: usize) -> NonZeroUsize {
    NonZeroUsize::new(count).unwrap_or(NonZeroUsize::MIN)
}
