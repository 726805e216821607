//! Telemetry: structured logging, spans, and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_cancel_requests, record_discarded, record_executed, record_pending,
    record_submitted, record_suspended, record_workers,
};
pub use spans::{operation_span, worker_span, SpanExt};
