//! tierstack - a tiered LIFO operation scheduler.
//!
//! A bounded pool of worker threads drains five priority stacks. Within a
//! tier the newest ready operation runs first; any operation in a more
//! urgent tier runs before every operation in a less urgent one.
//!
//! # Capabilities
//!
//! - **Resizable**: grow or shrink the worker set at runtime
//! - **Suspendable**: pause and resume all workers at once
//! - **Cancellable**: advisory, checked by the operation itself
//! - **Idle barrier**: block until nothing is pending or running
//!
//! ```no_run
//! use std::sync::Arc;
//! use tierstack::scheduler::{BlockOperation, OperationRef, Priority, StackPool};
//!
//! let pool = StackPool::new(4)?;
//! let ops: Vec<OperationRef> = (0..8)
//!     .map(|i| Arc::new(BlockOperation::with_priority(Priority::from(i % 5), |_| {})) as OperationRef)
//!     .collect();
//! pool.submit_batch(ops, true)?;
//! # Ok::<(), tierstack::scheduler::PoolError>(())
//! ```

pub mod cli;
pub mod config;
pub mod scheduler;
pub mod telemetry;

pub use config::Config;
pub use scheduler::{
    BlockOperation, CancelFlag, Operation, OperationRef, PoolConfig, PoolError, PoolStats,
    Priority, StackPool,
};
