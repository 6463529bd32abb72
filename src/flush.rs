//! Flush scheduling.
//!
//! The applier notifies the scheduler when a memory table crosses its
//! write-buffer high-water mark. Duplicate notifications are prevented
//! upstream by the table's single-shot `mark_flush_scheduled` claim; the
//! queue itself just hands descriptors to whatever drains it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::family::ColumnFamilyData;

/// Queue of column families whose memory tables are due for a flush.
#[derive(Debug, Default)]
pub struct FlushScheduler {
    queue: Mutex<VecDeque<Arc<ColumnFamilyData>>>,
}

impl FlushScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a family for flushing.
    ///
    /// Callers claim the table's `mark_flush_scheduled` flag first, so each
    /// table is enqueued at most once per fill.
    pub fn schedule_flush(&self, cfd: Arc<ColumnFamilyData>) {
        self.queue.lock().push_back(cfd);
    }

    /// Dequeue the next family due for a flush.
    pub fn take_next(&self) -> Option<Arc<ColumnFamilyData>> {
        self.queue.lock().pop_front()
    }

    /// Whether any flushes are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Number of pending flushes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
