//! MemTable - In-memory sorted storage for recent writes.
//!
//! The MemTable is the destination for applied batch records. It uses a
//! concurrent skip list for efficient sorted storage that supports
//! multiple readers and writers.
//!
//! # Design
//!
//! - Uses `crossbeam-skiplist` for lock-free concurrent access
//! - Keys are encoded `InternalKey`s (user_key + sequence + type) for MVCC
//! - Values are raw bytes; tombstones store an empty value
//! - Merge operands are stored unfolded and counted per key
//!
//! # MVCC Semantics
//!
//! Multiple versions of the same user key can exist with different
//! sequence numbers. Reads at a specific sequence number see the
//! latest version at or before that sequence.

use bytes::{BufMut, Bytes, BytesMut};
use crossbeam_skiplist::SkipMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::options::{MemTableOptions, UpdateStatus};
use crate::types::{InternalKey, LookupResult, ValueType};

/// MemTable for in-memory sorted storage.
///
/// Thread-safe for concurrent reads and writes through the skip list; the
/// in-place update paths additionally require exclusive use by the applier.
#[derive(Debug)]
pub struct MemTable {
    /// The underlying skip list.
    /// Key: encoded InternalKey, Value: raw bytes or empty for deletions
    table: SkipMap<Bytes, Bytes>,

    /// Per-family configuration this table was built with.
    options: Arc<MemTableOptions>,

    /// Approximate memory usage in bytes.
    approximate_memory_usage: AtomicUsize,

    /// Minimum sequence number in this memtable.
    min_sequence: AtomicU64,

    /// Maximum sequence number in this memtable.
    max_sequence: AtomicU64,

    /// Number of entries.
    entry_count: AtomicUsize,

    /// Single-shot claim preventing duplicate flush notifications.
    flush_scheduled: AtomicBool,

    /// Unique ID for this memtable.
    id: u64,
}

impl MemTable {
    /// Create a new empty MemTable.
    pub fn new(id: u64, options: Arc<MemTableOptions>) -> Self {
        Self {
            table: SkipMap::new(),
            options,
            approximate_memory_usage: AtomicUsize::new(0),
            min_sequence: AtomicU64::new(u64::MAX),
            max_sequence: AtomicU64::new(0),
            entry_count: AtomicUsize::new(0),
            flush_scheduled: AtomicBool::new(false),
            id,
        }
    }

    /// Get the memtable ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The configuration this table was built with.
    pub fn options(&self) -> &Arc<MemTableOptions> {
        &self.options
    }

    /// Insert a record of the given kind.
    ///
    /// Deletion kinds ignore `value` and store an empty tombstone.
    pub fn add(&self, sequence: u64, value_type: ValueType, key: &[u8], value: &[u8]) {
        debug_assert!(matches!(
            value_type,
            ValueType::Value | ValueType::Merge | ValueType::Deletion | ValueType::SingleDeletion
        ));

        let encoded_key = InternalKey::new(Bytes::copy_from_slice(key), sequence, value_type).encode();
        let value_bytes = if value_type.is_deletion() {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(value)
        };

        // Update memory usage estimate
        let entry_size = encoded_key.len() + value_bytes.len() + 64; // 64 bytes overhead estimate
        self.approximate_memory_usage
            .fetch_add(entry_size, Ordering::Relaxed);

        self.update_sequence_bounds(sequence);

        self.table.insert(encoded_key, value_bytes);
        self.entry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Best-effort in-place overwrite of the newest Value entry for `key`.
    ///
    /// Falls back to a plain insert at `sequence` when the key has no Value
    /// head to rewrite. Requires exclusive use by the applier.
    pub fn update(&self, sequence: u64, key: &[u8], value: &[u8]) {
        match self.newest_entry(key, InternalKey::MAX_SEQUENCE) {
            Some((existing_key, existing_value))
                if Self::entry_type(&existing_key) == Some(ValueType::Value) =>
            {
                let new_value = Bytes::copy_from_slice(value);
                if new_value.len() > existing_value.len() {
                    self.approximate_memory_usage
                        .fetch_add(new_value.len() - existing_value.len(), Ordering::Relaxed);
                }
                // Re-inserting an existing key replaces its value in place.
                self.table.insert(existing_key, new_value);
            }
            _ => self.add(sequence, ValueType::Value, key, value),
        }
    }

    /// Run the configured in-place callback against the newest Value entry
    /// for `key`.
    ///
    /// Returns true when the key was handled in-table (including a callback
    /// rejection); false when the key has no Value head and the caller must
    /// consult storage.
    pub fn update_with_callback(&self, sequence: u64, key: &[u8], delta: &[u8]) -> bool {
        let callback = match &self.options.inplace_callback {
            Some(cb) => cb,
            None => return false,
        };

        let (existing_key, existing_value) = match self.newest_entry(key, InternalKey::MAX_SEQUENCE)
        {
            Some(entry) if Self::entry_type(&entry.0) == Some(ValueType::Value) => entry,
            _ => return false,
        };

        match callback(Some(&existing_value), delta) {
            UpdateStatus::UpdatedInplace(final_value) => {
                if final_value.len() > existing_value.len() {
                    self.approximate_memory_usage
                        .fetch_add(final_value.len() - existing_value.len(), Ordering::Relaxed);
                }
                self.table.insert(existing_key, final_value);
                true
            }
            UpdateStatus::Updated(final_value) => {
                self.add(sequence, ValueType::Value, key, &final_value);
                true
            }
            UpdateStatus::Failed => true,
        }
    }

    /// Look up a key at a specific sequence number.
    ///
    /// Returns the newest version of the key with a sequence number <= the
    /// given sequence. A Merge head returns its raw operand; folding the
    /// operand chain is the read path's concern.
    pub fn get(&self, user_key: &[u8], sequence: u64) -> LookupResult {
        match self.newest_entry(user_key, sequence) {
            Some((encoded_key, value)) => match Self::entry_type(&encoded_key) {
                Some(vt) if vt.is_deletion() => LookupResult::Deleted,
                Some(_) => LookupResult::Found(value),
                None => LookupResult::NotFound,
            },
            None => LookupResult::NotFound,
        }
    }

    /// Newest visible state of `user_key` split into the merge operands
    /// buffered at the head of its version chain (oldest first) and the
    /// entry beneath them.
    ///
    /// Read paths resolve the chain by folding the operands over the base
    /// result with the family's merge operator.
    pub fn get_with_merge_operands(
        &self,
        user_key: &[u8],
        sequence: u64,
    ) -> (LookupResult, Vec<Bytes>) {
        let (lower, upper) = Self::version_bounds(user_key, sequence);
        let mut operands = Vec::new();
        let mut base = LookupResult::NotFound;

        for entry in self.table.range(lower..=upper).rev() {
            let encoded = entry.key();
            match InternalKey::parse_user_key(encoded) {
                Some(entry_key) if entry_key == user_key => {}
                _ => continue,
            }
            match Self::entry_type(encoded) {
                Some(ValueType::Merge) => operands.push(entry.value().clone()),
                Some(vt) if vt.is_deletion() => {
                    base = LookupResult::Deleted;
                    break;
                }
                Some(_) => {
                    base = LookupResult::Found(entry.value().clone());
                    break;
                }
                None => break,
            }
        }

        operands.reverse();
        (base, operands)
    }

    /// Count the consecutive Merge entries at the head of the key's version
    /// chain, visible at `sequence`.
    pub fn count_successive_merge_entries(&self, user_key: &[u8], sequence: u64) -> usize {
        let (lower, upper) = Self::version_bounds(user_key, sequence);
        let mut merges = 0;

        // Versions sort ascending by sequence; walk newest first.
        for entry in self.table.range(lower..=upper).rev() {
            let encoded = entry.key();
            match InternalKey::parse_user_key(encoded) {
                Some(entry_key) if entry_key == user_key => {}
                _ => continue,
            }
            if Self::entry_type(encoded) == Some(ValueType::Merge) {
                merges += 1;
            } else {
                break;
            }
        }

        merges
    }

    /// Whether this table has grown past its write buffer and should be
    /// handed to the flush scheduler.
    pub fn should_schedule_flush(&self) -> bool {
        self.approximate_memory_usage() >= self.options.write_buffer_size
    }

    /// Claim the single-shot flush notification. Returns true only for the
    /// caller that wins the claim.
    pub fn mark_flush_scheduled(&self) -> bool {
        self.flush_scheduled
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Get approximate memory usage in bytes.
    pub fn approximate_memory_usage(&self) -> usize {
        self.approximate_memory_usage.load(Ordering::Relaxed)
    }

    /// Get the number of entries.
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Check if the memtable is empty.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Get the minimum sequence number.
    pub fn min_sequence(&self) -> u64 {
        let min = self.min_sequence.load(Ordering::Relaxed);
        if min == u64::MAX {
            0
        } else {
            min
        }
    }

    /// Get the maximum sequence number.
    pub fn max_sequence(&self) -> u64 {
        self.max_sequence.load(Ordering::Relaxed)
    }

    /// Newest entry for `user_key` visible at `sequence`, as (encoded key,
    /// value).
    fn newest_entry(&self, user_key: &[u8], sequence: u64) -> Option<(Bytes, Bytes)> {
        let (lower, upper) = Self::version_bounds(user_key, sequence);

        for entry in self.table.range(lower..=upper).rev() {
            match InternalKey::parse_user_key(entry.key()) {
                Some(entry_key) if entry_key == user_key => {
                    return Some((entry.key().clone(), entry.value().clone()));
                }
                _ => continue,
            }
        }
        None
    }

    /// Encoded-key range covering every version of `user_key` with a
    /// sequence <= `sequence`, any value type.
    fn version_bounds(user_key: &[u8], sequence: u64) -> (Bytes, Bytes) {
        let mut lower = BytesMut::with_capacity(user_key.len() + 8);
        lower.put_slice(user_key);
        lower.put_u64(0);

        let mut upper = BytesMut::with_capacity(user_key.len() + 8);
        upper.put_slice(user_key);
        upper.put_u64((sequence << 8) | 0xFF);

        (lower.freeze(), upper.freeze())
    }

    /// Value type packed into an encoded internal key.
    fn entry_type(encoded: &[u8]) -> Option<ValueType> {
        encoded.last().and_then(|&b| ValueType::from_byte(b))
    }

    /// Update sequence bounds.
    fn update_sequence_bounds(&self, seq: u64) {
        // Update min
        let mut current_min = self.min_sequence.load(Ordering::Relaxed);
        while seq < current_min {
            match self.min_sequence.compare_exchange_weak(
                current_min,
                seq,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_min = x,
            }
        }

        // Update max
        let mut current_max = self.max_sequence.load(Ordering::Relaxed);
        while seq > current_max {
            match self.max_sequence.compare_exchange_weak(
                current_max,
                seq,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }
}
