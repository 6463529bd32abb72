//! Core types for batchdb.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Record tag carried in the wire encoding and in internal keys.
///
/// The byte values are fixed by the on-disk format and must not change:
/// the same tags appear in write-ahead-log payloads and replicated batch
/// buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// Deletion marker (tombstone), default column family.
    Deletion = 0,
    /// Normal value, default column family.
    Value = 1,
    /// Merge operand, default column family.
    Merge = 2,
    /// Opaque log-only blob; never applied to memory tables.
    LogData = 3,
    /// Deletion marker with an explicit column family id.
    ColumnFamilyDeletion = 4,
    /// Normal value with an explicit column family id.
    ColumnFamilyValue = 5,
    /// Merge operand with an explicit column family id.
    ColumnFamilyMerge = 6,
    /// Single-deletion marker, default column family.
    SingleDeletion = 7,
    /// Single-deletion marker with an explicit column family id.
    ColumnFamilySingleDeletion = 8,
}

impl ValueType {
    /// Create from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            2 => Some(ValueType::Merge),
            3 => Some(ValueType::LogData),
            4 => Some(ValueType::ColumnFamilyDeletion),
            5 => Some(ValueType::ColumnFamilyValue),
            6 => Some(ValueType::ColumnFamilyMerge),
            7 => Some(ValueType::SingleDeletion),
            8 => Some(ValueType::ColumnFamilySingleDeletion),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Check if this is a deletion marker of either flavor.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            ValueType::Deletion
                | ValueType::SingleDeletion
                | ValueType::ColumnFamilyDeletion
                | ValueType::ColumnFamilySingleDeletion
        )
    }
}

/// Internal key format used for memory-table storage.
///
/// An internal key combines:
/// - User key (the key provided by the user)
/// - Sequence number (version for MVCC)
/// - Value type (Value, Merge, or a deletion marker)
///
/// The sequence and value_type are packed into 8 bytes with sequence
/// in the high 56 bits and value_type in the low 8 bits, appended to the
/// user key big-endian so that encoded keys sort by (user key, sequence,
/// type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    /// The user-provided key.
    user_key: Bytes,
    /// Sequence number (version).
    sequence: u64,
    /// Value type.
    value_type: ValueType,
}

impl InternalKey {
    /// Maximum sequence number (56 bits).
    pub const MAX_SEQUENCE: u64 = (1 << 56) - 1;

    /// Create a new internal key.
    pub fn new(user_key: impl Into<Bytes>, sequence: u64, value_type: ValueType) -> Self {
        debug_assert!(sequence <= Self::MAX_SEQUENCE);
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    /// Create an internal key for a put operation.
    pub fn for_value(user_key: impl Into<Bytes>, sequence: u64) -> Self {
        Self::new(user_key, sequence, ValueType::Value)
    }

    /// Create an internal key for a delete operation.
    pub fn for_deletion(user_key: impl Into<Bytes>, sequence: u64) -> Self {
        Self::new(user_key, sequence, ValueType::Deletion)
    }

    /// Get the user key.
    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    /// Get the sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Get the value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Check if this is a deletion marker.
    pub fn is_deletion(&self) -> bool {
        self.value_type.is_deletion()
    }

    /// Encode the internal key to bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.user_key.len() + 8);
        self.encode_to(&mut buf);
        buf.freeze()
    }

    /// Encode into an existing buffer.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.user_key);
        let packed = (self.sequence << 8) | (self.value_type.to_byte() as u64);
        buf.put_u64(packed);
    }

    /// Decode an internal key from bytes.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        let user_key_len = data.len() - 8;
        let user_key = Bytes::copy_from_slice(&data[..user_key_len]);

        let mut packed_bytes = &data[user_key_len..];
        let packed = packed_bytes.get_u64();

        let value_type = ValueType::from_byte((packed & 0xFF) as u8)?;
        let sequence = packed >> 8;

        Some(Self {
            user_key,
            sequence,
            value_type,
        })
    }

    /// Get the encoded length.
    pub fn encoded_len(&self) -> usize {
        self.user_key.len() + 8
    }

    /// Parse the user key from encoded bytes without a full decode.
    pub fn parse_user_key(encoded: &[u8]) -> Option<&[u8]> {
        if encoded.len() < 8 {
            return None;
        }
        Some(&encoded[..encoded.len() - 8])
    }

    /// Parse the sequence from encoded bytes.
    pub fn parse_sequence(encoded: &[u8]) -> Option<u64> {
        if encoded.len() < 8 {
            return None;
        }
        let packed_bytes = &encoded[encoded.len() - 8..];
        let packed = u64::from_be_bytes(packed_bytes.try_into().ok()?);
        Some(packed >> 8)
    }
}

/// Result of a memory-table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// Value found. Merge heads return the raw operand; folding the operand
    /// chain is the read path's concern.
    Found(Bytes),
    /// Key was deleted (tombstone found).
    Deleted,
    /// Key not found.
    NotFound,
}

impl LookupResult {
    /// Check if a value was found.
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }

    /// Get the value if found.
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            LookupResult::Found(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to Option<Bytes>.
    pub fn into_option(self) -> Option<Bytes> {
        match self {
            LookupResult::Found(v) => Some(v),
            _ => None,
        }
    }
}
