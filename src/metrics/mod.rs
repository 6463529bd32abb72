//! Metrics and observability for batch application.
//!
//! Provides the atomic collector primitives plus the statistics sink the
//! memory-table applier records into: keys written and updated, deletes
//! dropped by the existence filter, merge-fold failures, and merge-operator
//! latency.

mod collector;

pub use collector::{Counter, Histogram, Timer};

/// Statistics recorded while applying batches to memory tables.
#[derive(Debug, Default)]
pub struct ApplyMetrics {
    /// Values added to a memory table through the in-place callback path.
    pub keys_written: Counter,
    /// Values overwritten in place.
    pub keys_updated: Counter,
    /// Deletes dropped because the key cannot exist.
    pub filtered_deletes: Counter,
    /// Merge folds rejected by the operator.
    pub merge_failures: Counter,
    /// Merge operator latency (microseconds).
    pub merge_operation_time: Histogram,
}

impl ApplyMetrics {
    /// Create a new, zeroed sink.
    pub fn new() -> Self {
        Self::default()
    }
}
