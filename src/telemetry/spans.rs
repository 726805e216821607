//! Span helpers for worker threads and operation execution.

use std::time::Duration;

use tracing::{debug_span, trace_span, Span};

use crate::scheduler::Priority;

/// Extension trait for recording an execution outcome into a span.
pub trait SpanExt {
    fn record_outcome(&self, panicked: bool, elapsed: Duration);
}

impl SpanExt for Span {
    fn record_outcome(&self, panicked: bool, elapsed: Duration) {
        self.record("status", if panicked { "panicked" } else { "ok" });
        self.record("elapsed_us", elapsed.as_micros() as u64);
    }
}

/// Span covering a worker thread's whole lifetime.
pub fn worker_span(worker_id: u64) -> Span {
    debug_span!("worker", worker_id)
}

/// Span covering one operation, with `status` and `elapsed_us` filled in
/// after it returns.
pub fn operation_span(tier: Priority, cancelled: bool) -> Span {
    trace_span!(
        "operation",
        tier = %tier,
        cancelled,
        status = tracing::field::Empty,
        elapsed_us = tracing::field::Empty,
    )
}
