use chunkvault_types::{RecordId, RecordKind};
use serde::{Deserialize, Serialize};

/// A stored record: identity + kind tag + opaque payload.
///
/// `StoredRecord` is the unit of storage. Stores never interpret `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Stable identity of the record.
    pub id: RecordId,
    /// What the payload encodes.
    pub kind: RecordKind,
    /// The serialized payload.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredRecord {
    /// Create a new stored record.
    pub fn new(id: RecordId, kind: RecordKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            id,
            kind,
            data,
            size,
        }
    }
}
