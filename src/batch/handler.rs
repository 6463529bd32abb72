//! Visitor protocol for iterating batch records.

use crate::error::Result;

use super::content_flags;

/// Handler invoked once per record, in buffer order, by
/// [`WriteBatch::iterate`](super::WriteBatch::iterate).
///
/// Any callback returning an error halts iteration immediately with that
/// error. Keys and values are borrowed views into the batch buffer.
pub trait BatchHandler {
    /// A value record.
    fn put(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()>;

    /// A deletion marker.
    fn delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()>;

    /// A single-deletion marker.
    fn single_delete(&mut self, cf_id: u32, key: &[u8]) -> Result<()>;

    /// A merge operand.
    fn merge(&mut self, cf_id: u32, key: &[u8], value: &[u8]) -> Result<()>;

    /// Opaque log-only bytes. Handlers that have no use for blobs ignore
    /// them.
    fn log_data(&mut self, _blob: &[u8]) {}

    /// Checked before each record; returning false stops iteration at the
    /// next record boundary.
    fn should_continue(&self) -> bool {
        true
    }
}

/// Derives the content-flag bits of a batch in a single pass.
#[derive(Debug, Default)]
pub(crate) struct ContentClassifier {
    pub(crate) flags: u32,
}

impl BatchHandler for ContentClassifier {
    fn put(&mut self, _cf_id: u32, _key: &[u8], _value: &[u8]) -> Result<()> {
        self.flags |= content_flags::HAS_PUT;
        Ok(())
    }

    fn delete(&mut self, _cf_id: u32, _key: &[u8]) -> Result<()> {
        self.flags |= content_flags::HAS_DELETE;
        Ok(())
    }

    fn single_delete(&mut self, _cf_id: u32, _key: &[u8]) -> Result<()> {
        self.flags |= content_flags::HAS_SINGLE_DELETE;
        Ok(())
    }

    fn merge(&mut self, _cf_id: u32, _key: &[u8], _value: &[u8]) -> Result<()> {
        self.flags |= content_flags::HAS_MERGE;
        Ok(())
    }
}
