//! Single-record codec for the write-batch wire format.
//!
//! Each record starts with a one-byte tag. Records targeting a non-default
//! column family carry the family id as a varint32 after the tag; keys and
//! values are length-prefixed byte runs. Decoded views borrow from the batch
//! buffer and stay valid until the batch is mutated.

use crate::error::{Error, Result};
use crate::types::ValueType;
use crate::util::coding::{decode_length_prefixed_slice, decode_varint32};

/// One decoded batch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// Key/value insertion.
    Put {
        /// Target column family (0 = default).
        cf_id: u32,
        /// User key.
        key: &'a [u8],
        /// Value bytes.
        value: &'a [u8],
    },
    /// Deletion marker.
    Delete {
        /// Target column family (0 = default).
        cf_id: u32,
        /// User key.
        key: &'a [u8],
    },
    /// Single-deletion marker.
    SingleDelete {
        /// Target column family (0 = default).
        cf_id: u32,
        /// User key.
        key: &'a [u8],
    },
    /// Merge operand.
    Merge {
        /// Target column family (0 = default).
        cf_id: u32,
        /// User key.
        key: &'a [u8],
        /// Operand bytes.
        value: &'a [u8],
    },
    /// Opaque blob carried alongside the mutations; not applied and not
    /// counted in the batch header.
    LogData {
        /// Blob bytes.
        blob: &'a [u8],
    },
}

impl Record<'_> {
    /// Whether this record contributes to the header count.
    pub fn is_counted(&self) -> bool {
        !matches!(self, Record::LogData { .. })
    }
}

/// Decode one record from the cursor, advancing it past the record.
///
/// The cursor may be partially consumed on failure; callers discard it on
/// the first error.
pub fn read_record<'a>(input: &mut &'a [u8]) -> Result<Record<'a>> {
    let (&tag_byte, rest) = input
        .split_first()
        .ok_or_else(|| Error::corruption("unknown WriteBatch tag"))?;
    *input = rest;

    let tag = ValueType::from_byte(tag_byte)
        .ok_or_else(|| Error::corruption("unknown WriteBatch tag"))?;

    match tag {
        ValueType::Value | ValueType::ColumnFamilyValue => {
            let cf_id = if tag == ValueType::ColumnFamilyValue {
                decode_varint32(input).ok_or_else(|| Error::corruption("bad WriteBatch Put"))?
            } else {
                0
            };
            let key = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Put"))?;
            let value = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Put"))?;
            Ok(Record::Put { cf_id, key, value })
        }
        ValueType::Deletion | ValueType::ColumnFamilyDeletion => {
            let cf_id = if tag == ValueType::ColumnFamilyDeletion {
                decode_varint32(input).ok_or_else(|| Error::corruption("bad WriteBatch Delete"))?
            } else {
                0
            };
            let key = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Delete"))?;
            Ok(Record::Delete { cf_id, key })
        }
        ValueType::SingleDeletion | ValueType::ColumnFamilySingleDeletion => {
            let cf_id = if tag == ValueType::ColumnFamilySingleDeletion {
                decode_varint32(input).ok_or_else(|| Error::corruption("bad WriteBatch Delete"))?
            } else {
                0
            };
            let key = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Delete"))?;
            Ok(Record::SingleDelete { cf_id, key })
        }
        ValueType::Merge | ValueType::ColumnFamilyMerge => {
            let cf_id = if tag == ValueType::ColumnFamilyMerge {
                decode_varint32(input).ok_or_else(|| Error::corruption("bad WriteBatch Merge"))?
            } else {
                0
            };
            let key = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Merge"))?;
            let value = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Merge"))?;
            Ok(Record::Merge { cf_id, key, value })
        }
        ValueType::LogData => {
            let blob = decode_length_prefixed_slice(input)
                .ok_or_else(|| Error::corruption("bad WriteBatch Blob"))?;
            Ok(Record::LogData { blob })
        }
    }
}
