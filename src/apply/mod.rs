//! Application of write batches to column-family memory tables.
//!
//! The [`MemTableInserter`] is a [`BatchHandler`] that walks a batch in
//! buffer order, assigns one sequence number per record, seeks the target
//! column family, and lands each record in that family's memory table. It
//! carries the recovery log-number check, the in-place-update and
//! delete-filter policies, write-time merge folding, and the flush trigger.
//!
//! Entry points apply either a single batch (seeded from its header
//! sequence) or an ordered group of writers sharing one inserter, so the
//! sequence space stays dense across the group.

use std::sync::Arc;

use crate::batch::{BatchHandler, WriteBatch};
use crate::error::{Error, Result};
use crate::family::{ColumnFamilyData, ColumnFamilyMemTables};
use crate::flush::FlushScheduler;
use crate::metrics::Timer;
use crate::options::UpdateStatus;
use crate::snapshot::SnapshotRead;
use crate::types::ValueType;

/// Knobs controlling how a batch lands in the memory tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Treat records for unknown column families as no-ops instead of
    /// failing the batch.
    pub ignore_missing_column_families: bool,

    /// WAL segment id being replayed; 0 outside recovery. Families that
    /// have already absorbed this segment skip the record.
    pub log_number: u64,

    /// Disable the delete existence filter even for tables that enable it.
    pub dont_filter_deletes: bool,

    /// The caller runs one inserter per thread over a cloned memtable set.
    /// Only the plain put path is legal in this mode.
    pub concurrent_memtable_writes: bool,
}

/// Outcome of positioning the cursor for one record.
enum Seek {
    /// Apply to this family.
    Apply(Arc<ColumnFamilyData>),
    /// Consume the sequence number but skip the record.
    Skip,
}

/// Handler that applies batch records to memory tables.
///
/// The memtable set must not be shared with concurrent inserters; under
/// `concurrent_memtable_writes` each thread owns a clone.
pub struct MemTableInserter<'a> {
    sequence: u64,
    memtables: &'a mut dyn ColumnFamilyMemTables,
    flush_scheduler: Option<&'a FlushScheduler>,
    db: Option<&'a dyn SnapshotRead>,
    options: ApplyOptions,
}

impl<'a> MemTableInserter<'a> {
    /// Create an inserter starting at `sequence`.
    pub fn new(
        sequence: u64,
        memtables: &'a mut dyn ColumnFamilyMemTables,
        flush_scheduler: Option<&'a FlushScheduler>,
        db: Option<&'a dyn SnapshotRead>,
        options: ApplyOptions,
    ) -> Self {
        Self {
            sequence,
            memtables,
            flush_scheduler,
            db,
            options,
        }
    }

    /// The sequence number the next record will receive.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Position the cursor for a record targeting `cf_id`.
    ///
    /// Every outcome consumes exactly one sequence number at the call site;
    /// the sequence space tracks WAL positions, not successful applies.
    fn seek_to_family(&mut self, cf_id: u32) -> Result<Seek> {
        if !self.memtables.seek(cf_id) {
            if self.options.ignore_missing_column_families {
                return Ok(Seek::Skip);
            }
            return Err(Error::invalid_argument(
                "Invalid column family specified in write batch",
            ));
        }

        // log_number is non-zero only during recovery. A family whose own
        // log number is ahead of the segment being replayed has already
        // absorbed these records; applying them twice would corrupt
        // update-in-place and merge workloads.
        if self.options.log_number != 0 && self.options.log_number < self.memtables.log_number() {
            return Ok(Seek::Skip);
        }

        match self.memtables.current() {
            Some(cfd) => Ok(Seek::Apply(Arc::clone(cfd))),
            None => Ok(Seek::Skip),
        }
    }

    fn delete_impl(&mut self, cf_id: u32, key: &[u8], delete_type: ValueType) -> Result<()> {
        let cfd = match self.seek_to_family(cf_id) {
            Ok(Seek::Apply(cfd)) => cfd,
            Ok(Seek::Skip) => {
                self.sequence += 1;
                return Ok(());
            }
            Err(e) => {
                self.sequence += 1;
                return Err(e);
            }
        };

        let mem = cfd.mem();
        let mopts = mem.options();

        if !self.options.dont_filter_deletes && mopts.filter_deletes {
            assert!(
                !self.options.concurrent_memtable_writes,
                "delete filtering requires exclusive memtable access"
            );
            if let Some(db) = self.db {
                if !db.key_may_exist(cf_id, key, self.sequence) {
                    if let Some(metrics) = &mopts.metrics {
                        metrics.filtered_deletes.inc();
                    }
                    // Filtered deletes do not consume a sequence number.
                    return Ok(());
                }
            }
        }

        mem.add(self.sequence, delete_type, key, &[]);
        self.sequence += 1;
        self.check_memtable_full(&cfd);
        Ok(())
    }

    fn check_memtable_full(&mut self, cfd: &Arc<ColumnFamilyData>) {
        if let Some(scheduler) = self.flush_scheduler {
            let mem = cfd.mem();
            // mark_flush_scheduled returns true only for the claim winner,
            // so the scheduler sees each table at most once.
            if mem.should_schedule_flush() && mem.mark_flush_scheduled() {
                scheduler.schedule_flush(Arc::clone(cfd));
            }
        }
    }
}

impl BatchHandler for MemTableInserter<'_> {
    fn put(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()> {
        let cfd = match self.seek_to_family(cf_id) {
            Ok(Seek::Apply(cfd)) => cfd,
            Ok(Seek::Skip) => {
                self.sequence += 1;
                return Ok(());
            }
            Err(e) => {
                self.sequence += 1;
                return Err(e);
            }
        };

        let mem = cfd.mem();
        let mopts = mem.options();

        if !mopts.inplace_update_support {
            mem.add(self.sequence, ValueType::Value, key, value);
        } else if let Some(callback) = &mopts.inplace_callback {
            assert!(
                !self.options.concurrent_memtable_writes,
                "in-place updates require exclusive memtable access"
            );
            if !mem.update_with_callback(self.sequence, key, value) {
                // Key not found in the memtable: read the prior value as of
                // the current sequence, combine, and land the result.
                let prev = self
                    .db
                    .and_then(|db| db.get(cf_id, key, self.sequence));
                match callback(prev.as_deref(), value) {
                    UpdateStatus::UpdatedInplace(final_value)
                    | UpdateStatus::Updated(final_value) => {
                        mem.add(self.sequence, ValueType::Value, key, &final_value);
                        if let Some(metrics) = &mopts.metrics {
                            metrics.keys_written.inc();
                        }
                    }
                    UpdateStatus::Failed => {}
                }
            }
        } else {
            assert!(
                !self.options.concurrent_memtable_writes,
                "in-place updates require exclusive memtable access"
            );
            mem.update(self.sequence, key, value);
            if let Some(metrics) = &mopts.metrics {
                metrics.keys_updated.inc();
            }
        }

        // Puts are logged unconditionally, so the sequence advances even
        // when the update above did not land in the table.
        self.sequence += 1;
        self.check_memtable_full(&cfd);
        Ok(())
    }

    fn delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()> {
        self.delete_impl(cf_id, key, ValueType::Deletion)
    }

    fn single_delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()> {
        self.delete_impl(cf_id, key, ValueType::SingleDeletion)
    }

    fn merge(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()> {
        assert!(
            !self.options.concurrent_memtable_writes,
            "merges require exclusive memtable access"
        );

        let cfd = match self.seek_to_family(cf_id) {
            Ok(Seek::Apply(cfd)) => cfd,
            Ok(Seek::Skip) => {
                self.sequence += 1;
                return Ok(());
            }
            Err(e) => {
                self.sequence += 1;
                return Err(e);
            }
        };

        let mem = cfd.mem();
        let mopts = mem.options();
        let mut folded = false;

        if mopts.max_successive_merges > 0 {
            if let (Some(db), Some(operator)) = (self.db, &mopts.merge_operator) {
                let num_merges = mem.count_successive_merge_entries(key, self.sequence);
                if num_merges >= mopts.max_successive_merges {
                    // Read at the current sequence so earlier merge operands
                    // from this same batch are folded in.
                    let existing = db.get(cf_id, key, self.sequence);
                    let result = {
                        let _timer = mopts
                            .metrics
                            .as_ref()
                            .map(|m| Timer::new(&m.merge_operation_time));
                        operator.full_merge(key, existing.as_deref(), &[value])
                    };
                    match result {
                        Some(new_value) => {
                            mem.add(self.sequence, ValueType::Value, key, &new_value);
                            folded = true;
                        }
                        None => {
                            if let Some(metrics) = &mopts.metrics {
                                metrics.merge_failures.inc();
                            }
                        }
                    }
                }
            }
        }

        if !folded {
            // Store the operand; the read path folds it later.
            mem.add(self.sequence, ValueType::Merge, key, value);
        }

        self.sequence += 1;
        self.check_memtable_full(&cfd);
        Ok(())
    }
}

/// One batch in a grouped write, with the slot its outcome is reported in.
#[derive(Debug)]
pub struct BatchWriter {
    /// The batch to apply.
    pub batch: WriteBatch,
    /// Outcome of applying this writer's batch.
    pub status: Result<()>,
    /// Set when the writer's pre-apply callback failed; the batch is
    /// skipped without consuming sequence numbers.
    pub callback_failed: bool,
}

impl BatchWriter {
    /// Wrap a batch with a fresh status slot.
    pub fn new(batch: WriteBatch) -> Self {
        Self {
            batch,
            status: Ok(()),
            callback_failed: false,
        }
    }
}

/// Apply one batch to the memory tables, seeded from the batch's header
/// sequence.
pub fn insert_into(
    batch: &WriteBatch,
    memtables: &mut dyn ColumnFamilyMemTables,
    flush_scheduler: Option<&FlushScheduler>,
    db: Option<&dyn SnapshotRead>,
    options: ApplyOptions,
) -> Result<()> {
    let mut inserter =
        MemTableInserter::new(batch.sequence(), memtables, flush_scheduler, db, options);
    batch.iterate(&mut inserter)
}

/// Apply a group of batches in writer order through one shared inserter.
///
/// Each non-failed writer's outcome is written back into its status slot;
/// the group aborts on the first error. The sequence carries across
/// batches, so the first record of writer N+1 follows the last record of
/// writer N.
pub fn insert_group(
    writers: &mut [BatchWriter],
    sequence: u64,
    memtables: &mut dyn ColumnFamilyMemTables,
    flush_scheduler: Option<&FlushScheduler>,
    db: Option<&dyn SnapshotRead>,
    options: ApplyOptions,
) -> Result<()> {
    let mut inserter = MemTableInserter::new(sequence, memtables, flush_scheduler, db, options);

    for writer in writers.iter_mut() {
        if writer.callback_failed {
            continue;
        }
        writer.status = writer.batch.iterate(&mut inserter);
        if let Err(e) = &writer.status {
            return Err(e.clone());
        }
    }
    Ok(())
}
