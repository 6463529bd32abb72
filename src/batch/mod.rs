//! Write batches: ordered groups of key-space mutations applied atomically.
//!
//! A batch owns a contiguous byte buffer holding its wire encoding. The
//! same bytes are appended to the write-ahead log, replayed on recovery,
//! and applied to memory tables, so the encoding is bit-exact across
//! producers and consumers.
//!
//! # Format
//!
//! ```text
//! batch  := sequence: fixed64 | count: fixed32 | record*
//! record := kTypeValue varstring varstring
//!         | kTypeDeletion varstring
//!         | kTypeSingleDeletion varstring
//!         | kTypeMerge varstring varstring
//!         | kTypeColumnFamilyValue varint32 varstring varstring
//!         | kTypeColumnFamilyDeletion varint32 varstring
//!         | kTypeColumnFamilySingleDeletion varint32 varstring
//!         | kTypeColumnFamilyMerge varint32 varstring varstring
//!         | kTypeLogData varstring
//! varstring := len: varint32 | data: uint8[len]
//! ```
//!
//! Log-data records are carried alongside the mutations but are not counted
//! in the header and never reach memory tables.

mod handler;
mod record;

pub use handler::BatchHandler;
pub use record::{read_record, Record};

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::types::ValueType;
use crate::util::coding::{
    encode_length_prefixed, encode_length_prefixed_parts, encode_varint32, read_fixed32,
    read_fixed64, write_fixed32, write_fixed64,
};

use self::handler::ContentClassifier;

/// Number of header bytes: an 8-byte sequence number followed by a 4-byte
/// record count, both little-endian.
pub const HEADER_SIZE: usize = 12;

/// Bits cached in the batch's content-flag word.
pub(crate) mod content_flags {
    /// The cache is stale; recompute by iteration.
    pub const DEFERRED: u32 = 1;
    pub const HAS_PUT: u32 = 2;
    pub const HAS_DELETE: u32 = 4;
    pub const HAS_SINGLE_DELETE: u32 = 8;
    pub const HAS_MERGE: u32 = 16;
}

/// Batch state captured by [`WriteBatch::set_save_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SavePoint {
    size: usize,
    count: u32,
    content_flags: u32,
}

/// An ordered, atomically-applied group of key-space mutations encoded into
/// a single byte buffer.
///
/// Not safe for concurrent mutation; concurrent readers of an immutable
/// batch are fine. The content-flag cache is a relaxed atomic so racing
/// readers may each recompute but always observe self-consistent results.
#[derive(Debug)]
pub struct WriteBatch {
    /// Wire encoding: 12-byte header followed by packed records.
    rep: BytesMut,
    /// Cached content classification; see [`content_flags`].
    content_flags: AtomicU32,
    /// Save-point stack, created lazily on first use.
    save_points: Option<Vec<SavePoint>>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WriteBatch {
    fn clone(&self) -> Self {
        Self {
            rep: self.rep.clone(),
            content_flags: AtomicU32::new(self.content_flags.load(Ordering::Relaxed)),
            save_points: self.save_points.clone(),
        }
    }
}

impl WriteBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new empty batch with a buffer reservation hint.
    pub fn with_capacity(reserved_bytes: usize) -> Self {
        let mut rep = BytesMut::with_capacity(reserved_bytes.max(HEADER_SIZE));
        rep.resize(HEADER_SIZE, 0);
        Self {
            rep,
            content_flags: AtomicU32::new(0),
            save_points: None,
        }
    }

    /// Adopt an existing wire encoding verbatim.
    ///
    /// Content flags are deferred until first inspection. The buffer must
    /// cover at least the header.
    pub fn from_data(data: impl AsRef<[u8]>) -> Result<Self> {
        let data = data.as_ref();
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }
        Ok(Self {
            rep: BytesMut::from(data),
            content_flags: AtomicU32::new(content_flags::DEFERRED),
            save_points: None,
        })
    }

    /// The wire encoding, header included.
    pub fn data(&self) -> &[u8] {
        &self.rep
    }

    /// Size of the wire encoding in bytes.
    pub fn data_size(&self) -> usize {
        self.rep.len()
    }

    /// Whether the batch carries no records at all (not even log data).
    pub fn is_empty(&self) -> bool {
        self.rep.len() <= HEADER_SIZE
    }

    /// Number of counted records (everything except log data).
    pub fn count(&self) -> u32 {
        read_fixed32(&self.rep[8..HEADER_SIZE]).unwrap_or(0)
    }

    /// The starting sequence number assigned by the write pipeline.
    pub fn sequence(&self) -> u64 {
        read_fixed64(&self.rep[..8]).unwrap_or(0)
    }

    // --- Appends ---------------------------------------------------------

    /// Store `key -> value` in the default column family.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.put_cf(0, key, value);
    }

    /// Store `key -> value` in the given column family.
    pub fn put_cf(&mut self, cf_id: u32, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Value, ValueType::ColumnFamilyValue, cf_id);
        encode_length_prefixed(&mut self.rep, key);
        encode_length_prefixed(&mut self.rep, value);
        self.or_flags(content_flags::HAS_PUT);
    }

    /// Gather-list form of [`put_cf`](Self::put_cf): key and value are each
    /// the concatenation of their fragments.
    pub fn put_cf_parts(&mut self, cf_id: u32, key: &[&[u8]], value: &[&[u8]]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Value, ValueType::ColumnFamilyValue, cf_id);
        encode_length_prefixed_parts(&mut self.rep, key);
        encode_length_prefixed_parts(&mut self.rep, value);
        self.or_flags(content_flags::HAS_PUT);
    }

    /// Delete `key` from the default column family.
    pub fn delete(&mut self, key: &[u8]) {
        self.delete_cf(0, key);
    }

    /// Delete `key` from the given column family.
    pub fn delete_cf(&mut self, cf_id: u32, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Deletion, ValueType::ColumnFamilyDeletion, cf_id);
        encode_length_prefixed(&mut self.rep, key);
        self.or_flags(content_flags::HAS_DELETE);
    }

    /// Gather-list form of [`delete_cf`](Self::delete_cf).
    pub fn delete_cf_parts(&mut self, cf_id: u32, key: &[&[u8]]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Deletion, ValueType::ColumnFamilyDeletion, cf_id);
        encode_length_prefixed_parts(&mut self.rep, key);
        self.or_flags(content_flags::HAS_DELETE);
    }

    /// Single-delete `key` in the default column family.
    pub fn single_delete(&mut self, key: &[u8]) {
        self.single_delete_cf(0, key);
    }

    /// Single-delete `key` in the given column family.
    pub fn single_delete_cf(&mut self, cf_id: u32, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.append_tag(
            ValueType::SingleDeletion,
            ValueType::ColumnFamilySingleDeletion,
            cf_id,
        );
        encode_length_prefixed(&mut self.rep, key);
        self.or_flags(content_flags::HAS_SINGLE_DELETE);
    }

    /// Gather-list form of [`single_delete_cf`](Self::single_delete_cf).
    pub fn single_delete_cf_parts(&mut self, cf_id: u32, key: &[&[u8]]) {
        self.set_count(self.count() + 1);
        self.append_tag(
            ValueType::SingleDeletion,
            ValueType::ColumnFamilySingleDeletion,
            cf_id,
        );
        encode_length_prefixed_parts(&mut self.rep, key);
        self.or_flags(content_flags::HAS_SINGLE_DELETE);
    }

    /// Append a merge operand for `key` in the default column family.
    pub fn merge(&mut self, key: &[u8], value: &[u8]) {
        self.merge_cf(0, key, value);
    }

    /// Append a merge operand for `key` in the given column family.
    pub fn merge_cf(&mut self, cf_id: u32, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Merge, ValueType::ColumnFamilyMerge, cf_id);
        encode_length_prefixed(&mut self.rep, key);
        encode_length_prefixed(&mut self.rep, value);
        self.or_flags(content_flags::HAS_MERGE);
    }

    /// Gather-list form of [`merge_cf`](Self::merge_cf).
    pub fn merge_cf_parts(&mut self, cf_id: u32, key: &[&[u8]], value: &[&[u8]]) {
        self.set_count(self.count() + 1);
        self.append_tag(ValueType::Merge, ValueType::ColumnFamilyMerge, cf_id);
        encode_length_prefixed_parts(&mut self.rep, key);
        encode_length_prefixed_parts(&mut self.rep, value);
        self.or_flags(content_flags::HAS_MERGE);
    }

    /// Append opaque bytes that ride along in the log but are never applied
    /// to memory tables. Does not affect the record count or content flags.
    pub fn put_log_data(&mut self, blob: &[u8]) {
        self.rep.put_u8(ValueType::LogData.to_byte());
        encode_length_prefixed(&mut self.rep, blob);
    }

    // --- Content flags ---------------------------------------------------

    /// Whether the batch contains at least one put.
    pub fn has_put(&self) -> bool {
        self.compute_content_flags() & content_flags::HAS_PUT != 0
    }

    /// Whether the batch contains at least one delete.
    pub fn has_delete(&self) -> bool {
        self.compute_content_flags() & content_flags::HAS_DELETE != 0
    }

    /// Whether the batch contains at least one single-delete.
    pub fn has_single_delete(&self) -> bool {
        self.compute_content_flags() & content_flags::HAS_SINGLE_DELETE != 0
    }

    /// Whether the batch contains at least one merge.
    pub fn has_merge(&self) -> bool {
        self.compute_content_flags() & content_flags::HAS_MERGE != 0
    }

    fn compute_content_flags(&self) -> u32 {
        let mut flags = self.content_flags.load(Ordering::Relaxed);
        if flags & content_flags::DEFERRED != 0 {
            let mut classifier = ContentClassifier::default();
            // Classification is best-effort on a corrupt buffer.
            let _ = self.iterate(&mut classifier);
            flags = classifier.flags;
            self.content_flags.store(flags, Ordering::Relaxed);
        }
        flags
    }

    fn or_flags(&mut self, bits: u32) {
        let current = self.content_flags.load(Ordering::Relaxed);
        self.content_flags.store(current | bits, Ordering::Relaxed);
    }

    // --- Iteration -------------------------------------------------------

    /// Walk the records in buffer order, dispatching each to `handler`.
    ///
    /// Iteration stops early when the handler's continuation predicate turns
    /// false or a callback returns an error. When the payload is consumed to
    /// the end, the number of counted records must match the header count.
    pub fn iterate<H: BatchHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        if self.rep.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }

        let mut input: &[u8] = &self.rep[HEADER_SIZE..];
        let mut found: u32 = 0;

        while !input.is_empty() && handler.should_continue() {
            match read_record(&mut input)? {
                Record::Put { cf_id, key, value } => {
                    handler.put(cf_id, key, value)?;
                    found += 1;
                }
                Record::Delete { cf_id, key } => {
                    handler.delete(cf_id, key)?;
                    found += 1;
                }
                Record::SingleDelete { cf_id, key } => {
                    handler.single_delete(cf_id, key)?;
                    found += 1;
                }
                Record::Merge { cf_id, key, value } => {
                    handler.merge(cf_id, key, value)?;
                    found += 1;
                }
                Record::LogData { blob } => handler.log_data(blob),
            }
        }

        if input.is_empty() && found != self.count() {
            return Err(Error::corruption("WriteBatch has wrong count"));
        }
        Ok(())
    }

    // --- Save points -----------------------------------------------------

    /// Record the current batch state for a later partial rollback.
    pub fn set_save_point(&mut self) {
        let save_point = SavePoint {
            size: self.rep.len(),
            count: self.count(),
            content_flags: self.content_flags.load(Ordering::Relaxed),
        };
        self.save_points.get_or_insert_with(Vec::new).push(save_point);
    }

    /// Revert the batch to the most recent save point and pop it.
    ///
    /// Returns a not-found error when no save point is outstanding.
    pub fn rollback_to_save_point(&mut self) -> Result<()> {
        let save_point = match self.save_points.as_mut().and_then(|stack| stack.pop()) {
            Some(sp) => sp,
            None => return Err(Error::not_found("no save point to roll back to")),
        };

        debug_assert!(save_point.size >= HEADER_SIZE);
        debug_assert!(save_point.size <= self.rep.len());
        debug_assert!(save_point.count <= self.count());

        if save_point.size == self.rep.len() {
            // No mutations since the save point was taken.
        } else if save_point.size == HEADER_SIZE {
            self.clear();
        } else {
            self.rep.truncate(save_point.size);
            self.set_count(save_point.count);
            self.content_flags
                .store(save_point.content_flags, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Reset the batch to empty: a zeroed header, no content flags, no save
    /// points.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_SIZE, 0);
        self.content_flags.store(0, Ordering::Relaxed);
        if let Some(stack) = &mut self.save_points {
            stack.clear();
        }
    }

    // --- Engine-internal operations --------------------------------------

    /// Overwrite the header sequence number. Reserved for the write
    /// pipeline; producers never set sequences.
    pub fn set_sequence(&mut self, sequence: u64) {
        write_fixed64(&mut self.rep[..8], sequence);
    }

    /// Overwrite the header record count.
    pub fn set_count(&mut self, count: u32) {
        write_fixed32(&mut self.rep[8..HEADER_SIZE], count);
    }

    /// Replace the entire wire encoding, deferring content flags.
    pub fn set_contents(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }
        self.rep.clear();
        self.rep.extend_from_slice(data);
        self.content_flags
            .store(content_flags::DEFERRED, Ordering::Relaxed);
        Ok(())
    }

    /// Splice `src`'s payload onto this batch: counts add, content flags
    /// combine, and `src`'s sequence is discarded.
    pub fn append(&mut self, src: &WriteBatch) {
        self.set_count(self.count() + src.count());
        self.rep.extend_from_slice(&src.rep[HEADER_SIZE..]);
        let combined = self.content_flags.load(Ordering::Relaxed)
            | src.content_flags.load(Ordering::Relaxed);
        self.content_flags.store(combined, Ordering::Relaxed);
    }

    /// Byte size of the concatenation of two encodings, for callers
    /// pre-sizing a merged buffer: one header is shared when both operands
    /// are non-empty.
    pub fn appended_byte_size(left_size: usize, right_size: usize) -> usize {
        if left_size == 0 || right_size == 0 {
            left_size + right_size
        } else {
            left_size + right_size - HEADER_SIZE
        }
    }

    fn append_tag(&mut self, default_tag: ValueType, cf_tag: ValueType, cf_id: u32) {
        if cf_id == 0 {
            self.rep.put_u8(default_tag.to_byte());
        } else {
            self.rep.put_u8(cf_tag.to_byte());
            encode_varint32(&mut self.rep, cf_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects (kind, cf, key, value) tuples in iteration order.
    #[derive(Default)]
    struct Collector {
        records: Vec<(&'static str, u32, Vec<u8>, Vec<u8>)>,
        blobs: Vec<Vec<u8>>,
    }

    impl BatchHandler for Collector {
        fn put(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()> {
            self.records.push(("put", cf_id, key.to_vec(), value.to_vec()));
            Ok(())
        }

        fn delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()> {
            self.records.push(("delete", cf_id, key.to_vec(), Vec::new()));
            Ok(())
        }

        fn single_delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()> {
            self.records
                .push(("single_delete", cf_id, key.to_vec(), Vec::new()));
            Ok(())
        }

        fn merge(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()> {
            self.records
                .push(("merge", cf_id, key.to_vec(), value.to_vec()));
            Ok(())
        }

        fn log_data(&mut self, blob: &[u8]) {
            self.blobs.push(blob.to_vec());
        }
    }

    #[test]
    fn test_empty_batch() {
        let batch = WriteBatch::new();

        assert_eq!(batch.data(), &[0u8; 12]);
        assert_eq!(batch.count(), 0);
        assert_eq!(batch.sequence(), 0);
        assert!(batch.is_empty());

        let mut collector = Collector::default();
        batch.iterate(&mut collector).unwrap();
        assert!(collector.records.is_empty());
        assert!(collector.blobs.is_empty());
    }

    #[test]
    fn test_single_put_encoding() {
        let mut batch = WriteBatch::new();
        batch.put(b"abc", b"xyz");

        let mut expected = vec![0u8; 12];
        expected[8] = 1; // count
        expected.extend_from_slice(&[1, 3, b'a', b'b', b'c', 3, b'x', b'y', b'z']);
        assert_eq!(batch.data(), &expected[..]);

        assert_eq!(batch.count(), 1);
        assert!(batch.has_put());
        assert!(!batch.has_delete());
        assert!(!batch.has_single_delete());
        assert!(!batch.has_merge());
    }

    #[test]
    fn test_cf_zero_uses_default_tags() {
        let mut explicit = WriteBatch::new();
        explicit.put_cf(0, b"k", b"v");
        explicit.delete_cf(0, b"k");
        explicit.single_delete_cf(0, b"k");
        explicit.merge_cf(0, b"k", b"v");

        let mut default = WriteBatch::new();
        default.put(b"k", b"v");
        default.delete(b"k");
        default.single_delete(b"k");
        default.merge(b"k", b"v");

        assert_eq!(explicit.data(), default.data());
    }

    #[test]
    fn test_cross_family_iteration_order() {
        let mut batch = WriteBatch::new();
        batch.put_cf(1, b"k", b"v");
        batch.delete_cf(0, b"k2");
        batch.merge_cf(7, b"k3", b"v3");

        assert_eq!(batch.count(), 3);
        assert!(batch.has_put());
        assert!(batch.has_delete());
        assert!(batch.has_merge());
        assert!(!batch.has_single_delete());

        let mut collector = Collector::default();
        batch.iterate(&mut collector).unwrap();
        assert_eq!(
            collector.records,
            vec![
                ("put", 1, b"k".to_vec(), b"v".to_vec()),
                ("delete", 0, b"k2".to_vec(), Vec::new()),
                ("merge", 7, b"k3".to_vec(), b"v3".to_vec()),
            ]
        );
    }

    #[test]
    fn test_parts_encoding_matches_contiguous() {
        let mut gathered = WriteBatch::new();
        gathered.put_cf_parts(4, &[b"ab", b"c"], &[b"x", b"yz"]);
        gathered.delete_cf_parts(4, &[b"a", b"b"]);
        gathered.single_delete_cf_parts(0, &[b"q"]);
        gathered.merge_cf_parts(0, &[b"m"], &[b"1", b"2"]);

        let mut contiguous = WriteBatch::new();
        contiguous.put_cf(4, b"abc", b"xyz");
        contiguous.delete_cf(4, b"ab");
        contiguous.single_delete(b"q");
        contiguous.merge(b"m", b"12");

        assert_eq!(gathered.data(), contiguous.data());
        assert_eq!(gathered.count(), 4);
    }

    #[test]
    fn test_log_data_not_counted() {
        let mut batch = WriteBatch::new();
        batch.put_log_data(b"annotation");
        batch.put(b"k", b"v");

        assert_eq!(batch.count(), 1);
        assert!(!batch.is_empty());

        let mut collector = Collector::default();
        batch.iterate(&mut collector).unwrap();
        assert_eq!(collector.blobs, vec![b"annotation".to_vec()]);
        assert_eq!(collector.records.len(), 1);

        // Log data alone leaves every content flag unset.
        let mut blob_only = WriteBatch::new();
        blob_only.put_log_data(b"x");
        assert!(!blob_only.has_put());
        assert!(!blob_only.has_delete());
        assert!(!blob_only.has_merge());
    }

    #[test]
    fn test_from_data_defers_flags() {
        let mut source = WriteBatch::new();
        source.put(b"a", b"1");
        source.single_delete(b"b");

        let adopted = WriteBatch::from_data(source.data()).unwrap();
        assert_eq!(adopted.count(), 2);
        assert!(adopted.has_put());
        assert!(adopted.has_single_delete());
        assert!(!adopted.has_delete());
        assert!(!adopted.has_merge());
    }

    #[test]
    fn test_from_data_too_small() {
        let err = WriteBatch::from_data([0u8; 11]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Corruption detected: malformed WriteBatch (too small)"
        );
    }

    #[test]
    fn test_save_point_rollback() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");

        let mut reference = WriteBatch::new();
        reference.put(b"a", b"1");

        batch.set_save_point();
        batch.put(b"b", b"2");
        batch.delete(b"c");
        batch.rollback_to_save_point().unwrap();

        assert_eq!(batch.data(), reference.data());
        assert_eq!(batch.count(), 1);
        assert!(batch.has_put());
        assert!(!batch.has_delete());
    }

    #[test]
    fn test_rollback_without_save_point() {
        let mut batch = WriteBatch::new();
        let err = batch.rollback_to_save_point().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rollback_noop_when_unchanged() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.set_save_point();
        let before = batch.data().to_vec();

        batch.rollback_to_save_point().unwrap();
        assert_eq!(batch.data(), &before[..]);
    }

    #[test]
    fn test_rollback_to_empty_clears() {
        let mut batch = WriteBatch::new();
        batch.set_save_point();
        batch.put(b"a", b"1");
        batch.rollback_to_save_point().unwrap();

        assert_eq!(batch.data(), &[0u8; 12]);
        assert_eq!(batch.count(), 0);
        assert!(!batch.has_put());
    }

    #[test]
    fn test_nested_save_points() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.set_save_point();
        batch.merge(b"b", b"2");
        batch.set_save_point();
        batch.delete(b"c");

        batch.rollback_to_save_point().unwrap();
        assert_eq!(batch.count(), 2);
        assert!(batch.has_merge());
        assert!(!batch.has_delete());

        batch.rollback_to_save_point().unwrap();
        assert_eq!(batch.count(), 1);
        assert!(batch.has_put());
        assert!(!batch.has_merge());
    }

    #[test]
    fn test_rollback_restores_deferred_flags() {
        let mut source = WriteBatch::new();
        source.put(b"a", b"1");

        // Adopted bytes leave the flags deferred; a rollback must restore
        // that unknown state rather than freeze a partial answer.
        let mut batch = WriteBatch::from_data(source.data()).unwrap();
        batch.set_save_point();
        batch.delete(b"b");
        batch.rollback_to_save_point().unwrap();

        assert!(batch.has_put());
        assert!(!batch.has_delete());
    }

    #[test]
    fn test_clear() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.set_save_point();
        batch.merge(b"b", b"2");
        batch.clear();

        assert_eq!(batch.data(), &[0u8; 12]);
        assert_eq!(batch.count(), 0);
        assert!(!batch.has_put());
        assert!(!batch.has_merge());
        assert!(batch.rollback_to_save_point().unwrap_err().is_not_found());
    }

    #[test]
    fn test_append_concatenation() {
        let mut a = WriteBatch::new();
        a.set_sequence(17);
        a.put(b"a", b"1");

        let mut b = WriteBatch::new();
        b.set_sequence(99);
        b.delete(b"b");
        b.merge(b"c", b"3");

        let a_size = a.data_size();
        let b_size = b.data_size();
        a.append(&b);

        assert_eq!(a.count(), 3);
        assert_eq!(a.sequence(), 17);
        assert_eq!(a.data_size(), WriteBatch::appended_byte_size(a_size, b_size));
        assert!(a.has_put());
        assert!(a.has_delete());
        assert!(a.has_merge());

        let mut collector = Collector::default();
        a.iterate(&mut collector).unwrap();
        assert_eq!(
            collector.records,
            vec![
                ("put", 0, b"a".to_vec(), b"1".to_vec()),
                ("delete", 0, b"b".to_vec(), Vec::new()),
                ("merge", 0, b"c".to_vec(), b"3".to_vec()),
            ]
        );
    }

    #[test]
    fn test_appended_byte_size_empty_operands() {
        assert_eq!(WriteBatch::appended_byte_size(0, 40), 40);
        assert_eq!(WriteBatch::appended_byte_size(40, 0), 40);
        assert_eq!(WriteBatch::appended_byte_size(40, 30), 58);
    }

    #[test]
    fn test_wrong_count_detection() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");

        // Truncate the payload to a single 5-byte record.
        let truncated: Vec<u8> = batch.data()[..12 + 5].to_vec();
        let corrupt = WriteBatch::from_data(truncated).unwrap();
        let mut collector = Collector::default();
        let err = corrupt.iterate(&mut collector).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Corruption detected: WriteBatch has wrong count"
        );

        // Inflate the header count beyond the true record count.
        let mut inflated = batch.clone();
        inflated.set_count(5);
        let err = inflated.iterate(&mut Collector::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Corruption detected: WriteBatch has wrong count"
        );
    }

    #[test]
    fn test_iterate_surfaces_record_corruption() {
        let mut data = vec![0u8; 12];
        data[8] = 1;
        data.extend_from_slice(&[42, 1, b'k']); // unknown tag
        let batch = WriteBatch::from_data(data).unwrap();

        let err = batch.iterate(&mut Collector::default()).unwrap_err();
        assert_eq!(err.to_string(), "Corruption detected: unknown WriteBatch tag");
    }

    #[test]
    fn test_set_contents_replaces_buffer() {
        let mut source = WriteBatch::new();
        source.merge(b"k", b"v");

        let mut batch = WriteBatch::new();
        batch.put(b"old", b"old");
        batch.set_contents(source.data()).unwrap();

        assert_eq!(batch.count(), 1);
        assert!(batch.has_merge());
        assert!(!batch.has_put());
        assert!(batch.set_contents(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.set_save_point();

        let mut copy = batch.clone();
        copy.put(b"b", b"2");

        assert_eq!(batch.count(), 1);
        assert_eq!(copy.count(), 2);

        // Each clone rolls back through its own stack.
        copy.rollback_to_save_point().unwrap();
        assert_eq!(copy.count(), 1);
        assert_eq!(copy.data(), batch.data());
    }

    #[test]
    fn test_round_trip_through_data() {
        let mut batch = WriteBatch::new();
        batch.set_sequence(7);
        batch.put_cf(2, b"k1", b"v1");
        batch.put_log_data(b"blob");
        batch.single_delete_cf(3, b"k2");

        let restored = WriteBatch::from_data(batch.data()).unwrap();
        assert_eq!(restored.sequence(), 7);
        assert_eq!(restored.count(), 2);

        let mut original = Collector::default();
        batch.iterate(&mut original).unwrap();
        let mut decoded = Collector::default();
        restored.iterate(&mut decoded).unwrap();

        assert_eq!(original.records, decoded.records);
        assert_eq!(original.blobs, decoded.blobs);
    }
}
