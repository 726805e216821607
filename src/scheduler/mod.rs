//! Operation scheduling.
//!
//! A [`StackPool`] keeps one LIFO stack per [`Priority`] tier and a resizable
//! set of worker threads that drain them, most urgent tier first and newest
//! operation first within a tier.

mod operation;
mod pool;
mod priority;
pub mod signal;
pub mod stacks;
mod stats;
mod thread_pool;
mod worker;

pub use operation::{BlockOperation, CancelFlag, Operation};
pub use pool::{clamp_concurrency, PoolConfig, DEFAULT_THREAD_PREFIX};
pub use priority::Priority;
pub use stacks::{OperationRef, PriorityStacks};
pub use stats::PoolStats;
pub use thread_pool::{PoolError, StackPool};
pub use worker::WorkerState;
