//! Pinned-sequence reads.
//!
//! The applier sometimes has to consult the database while inserting: the
//! in-place-update callback needs the key's prior value, delete filtering
//! needs an existence check, and merge folding needs the value the operands
//! apply on top of. All three read through a snapshot pinned at the
//! applier's current sequence so that earlier records of the same batch are
//! visible.

use bytes::Bytes;

/// Read access to the database as of a specific sequence number.
pub trait SnapshotRead {
    /// The newest value for `key` in `cf_id` visible at `sequence`, or None
    /// when the key is absent or deleted.
    fn get(&self, cf_id: u32, key: &[u8], sequence: u64) -> Option<Bytes>;

    /// Whether `key` may exist in `cf_id` at `sequence`. May return false
    /// positives but never false negatives; the default answers from `get`.
    fn key_may_exist(&self, cf_id: u32, key: &[u8], sequence: u64) -> bool {
        self.get(cf_id, key, sequence).is_some()
    }
}
