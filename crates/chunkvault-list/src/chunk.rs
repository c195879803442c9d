use chunkvault_store::StoredRecord;
use chunkvault_types::{RecordId, RecordKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ListError, ListResult};

/// Upper bound on the capacity reserved up front for a new chunk.
const MAX_RESERVED: usize = 4096;

/// A bounded run of list elements, in insertion order.
///
/// Persisted as the bincode encoding of its element sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chunk<T> {
    elements: Vec<T>,
}

impl<T> Chunk<T> {
    /// An empty chunk sized for `chunk_size` elements.
    pub fn with_capacity(chunk_size: u32) -> Self {
        let reserve = usize::try_from(chunk_size).map_or(MAX_RESERVED, |n| n.min(MAX_RESERVED));
        Self {
            elements: Vec::with_capacity(reserve),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether no further element fits under `chunk_size`.
    pub fn is_full(&self, chunk_size: u32) -> bool {
        self.elements.len() as u64 >= u64::from(chunk_size)
    }

    /// Element at `offset`, if present.
    pub fn get(&self, offset: usize) -> Option<&T> {
        self.elements.get(offset)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub(crate) fn push(&mut self, item: T) {
        self.elements.push(item);
    }
}

impl<T: Serialize> Chunk<T> {
    /// Encode into a `StoredRecord` under the given id.
    pub fn to_stored_record(&self, id: RecordId) -> ListResult<StoredRecord> {
        let data =
            bincode::serialize(self).map_err(|e| ListError::Serialization(e.to_string()))?;
        Ok(StoredRecord::new(id, RecordKind::Chunk, data))
    }
}

impl<T: DeserializeOwned> Chunk<T> {
    /// Decode from a `StoredRecord`.
    pub fn from_stored_record(record: &StoredRecord) -> ListResult<Self> {
        if record.kind != RecordKind::Chunk {
            return Err(ListError::CorruptRecord {
                id: record.id,
                reason: format!("expected chunk, got {}", record.kind),
            });
        }
        bincode::deserialize(&record.data).map_err(|e| ListError::CorruptRecord {
            id: record.id,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_of(items: &[u32]) -> Chunk<u32> {
        let mut chunk = Chunk::with_capacity(8);
        for item in items {
            chunk.push(*item);
        }
        chunk
    }

    #[test]
    fn fullness_tracks_chunk_size() {
        let chunk = chunk_of(&[1, 2, 3]);
        assert!(!chunk.is_full(4));
        assert!(chunk.is_full(3));
        assert!(chunk.is_full(2));
    }

    #[test]
    fn get_and_iter_follow_insertion_order() {
        let chunk = chunk_of(&[7, 8, 9]);
        assert_eq!(chunk.get(1), Some(&8));
        assert_eq!(chunk.get(3), None);
        assert_eq!(chunk.iter().copied().collect::<Vec<_>>(), vec![7, 8, 9]);
        assert_eq!(chunk.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn reservation_is_capped() {
        let chunk: Chunk<u8> = Chunk::with_capacity(u32::MAX);
        assert!(chunk.is_empty());
        assert!(chunk.elements.capacity() >= MAX_RESERVED);
        assert!(chunk.elements.capacity() < 2 * MAX_RESERVED);
    }

    #[test]
    fn stored_record_roundtrip() {
        let id = RecordId::new();
        let chunk = chunk_of(&[1, 2]);
        let record = chunk.to_stored_record(id).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.kind, RecordKind::Chunk);

        let decoded: Chunk<u32> = Chunk::from_stored_record(&record).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn wrong_kind_is_corrupt() {
        let record = StoredRecord::new(RecordId::new(), RecordKind::Directory, vec![]);
        let err = Chunk::<u32>::from_stored_record(&record).unwrap_err();
        assert!(matches!(err, ListError::CorruptRecord { .. }));
    }

    #[test]
    fn undecodable_payload_is_corrupt() {
        let record = StoredRecord::new(RecordId::new(), RecordKind::Chunk, vec![0xff; 3]);
        let err = Chunk::<u64>::from_stored_record(&record).unwrap_err();
        assert!(matches!(err, ListError::CorruptRecord { .. }));
    }
}
