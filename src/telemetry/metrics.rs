//! Pool metrics through the `metrics` facade.
//!
//! Nothing is exported unless the embedding application installs a recorder.

use metrics::{counter, gauge};

use crate::scheduler::Priority;

pub fn record_submitted(tier: Priority, count: usize) {
    counter!("tierstack_operations_submitted_total", "tier" => tier.as_str())
        .increment(count as u64);
}

pub fn record_executed(panicked: bool) {
    counter!("tierstack_operations_executed_total").increment(1);
    if panicked {
        counter!("tierstack_operations_panicked_total").increment(1);
    }
}

pub fn record_discarded(count: usize) {
    counter!("tierstack_operations_discarded_total").increment(count as u64);
}

pub fn record_cancel_requests(count: usize) {
    counter!("tierstack_cancel_requests_total").increment(count as u64);
}

pub fn record_pending(pending: usize) {
    gauge!("tierstack_pending_operations").set(pending as f64);
}

pub fn record_workers(live: usize) {
    gauge!("tierstack_live_workers").set(live as f64);
}

pub fn record_suspended(suspended: bool) {
    gauge!("tierstack_suspended").set(if suspended { 1.0 } else { 0.0 });
}
