use chunkvault_store::StoredRecord;
use chunkvault_types::{RecordId, RecordKind};
use serde::{Deserialize, Serialize};

use crate::error::{ListError, ListResult};

/// Durable shape of a chunk directory.
///
/// Only the chunk ids are recorded, so the encoding changes only when the
/// number of chunks does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub chunk_size: u32,
    pub chunks: Vec<RecordId>,
}

impl DirectoryRecord {
    /// Encode into a `StoredRecord` under the given id.
    pub fn to_stored_record(&self, id: RecordId) -> ListResult<StoredRecord> {
        let data =
            bincode::serialize(self).map_err(|e| ListError::Serialization(e.to_string()))?;
        Ok(StoredRecord::new(id, RecordKind::Directory, data))
    }

    /// Decode from a `StoredRecord`, rejecting a zero chunk size.
    pub fn from_stored_record(record: &StoredRecord) -> ListResult<Self> {
        if record.kind != RecordKind::Directory {
            return Err(ListError::CorruptRecord {
                id: record.id,
                reason: format!("expected directory, got {}", record.kind),
            });
        }
        let directory: Self =
            bincode::deserialize(&record.data).map_err(|e| ListError::CorruptRecord {
                id: record.id,
                reason: e.to_string(),
            })?;
        if directory.chunk_size == 0 {
            return Err(ListError::CorruptRecord {
                id: record.id,
                reason: "directory declares a chunk size of 0".into(),
            });
        }
        Ok(directory)
    }
}
