//! # batchdb
//!
//! The write-batch core of an LSM-tree key-value storage engine.
//!
//! A write batch is an ordered group of key-space mutations encoded into a
//! single byte buffer: the engine's unit of durability. The same bytes are
//! appended to the write-ahead log, replayed on recovery, and applied to
//! in-memory tables.
//!
//! ## Features
//!
//! - **Wire-compatible encoding**: tagged records with a fixed
//!   sequence/count header, bit-exact across producers and consumers
//! - **Batch manipulation**: appends across column families, content-flag
//!   introspection, save-points with partial rollback, concatenation
//! - **Visitor iteration**: one callback per record in buffer order, with
//!   early termination and log-data passthrough
//! - **Memory-table application**: sequence assignment, column-family
//!   dispatch, recovery idempotence, delete filtering, merge folding, and
//!   flush triggering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchdb::{ApplyOptions, ColumnFamilySet, MemTableOptions, WriteBatch};
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"hello", b"world");
//! batch.delete(b"stale");
//! batch.merge_cf(1, b"counter", b"+1");
//!
//! let mut families = ColumnFamilySet::new();
//! families.create_family(0, "default", MemTableOptions::new())?;
//! families.create_family(1, "counters", MemTableOptions::new())?;
//!
//! batchdb::insert_into(&batch, &mut families, None, None, ApplyOptions::default())?;
//! ```

// Public modules
pub mod error;
pub mod options;
pub mod types;

// Internal modules
mod apply;
mod batch;
mod family;
mod flush;
mod memtable;
mod merge;
mod metrics;
mod snapshot;
mod util;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{InplaceCallback, MemTableOptions, MemTableOptionsBuilder, UpdateStatus};
pub use types::{InternalKey, LookupResult, ValueType};

// Batches
pub use batch::{read_record, BatchHandler, Record, WriteBatch, HEADER_SIZE};

// Application
pub use apply::{insert_group, insert_into, ApplyOptions, BatchWriter, MemTableInserter};

// Column families and tables
pub use family::{ColumnFamilyData, ColumnFamilyMemTables, ColumnFamilySet};
pub use memtable::MemTable;

// Collaborator seams
pub use flush::FlushScheduler;
pub use merge::MergeOperator;
pub use snapshot::SnapshotRead;

// Metrics
pub use metrics::{ApplyMetrics, Counter, Histogram, Timer};
