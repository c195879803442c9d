use std::collections::HashMap;
use std::sync::RwLock;

use chunkvault_types::RecordId;

use crate::error::StoreResult;
use crate::record::StoredRecord;
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All records are held in memory behind a
/// `RwLock` for safe concurrent access. Records are cloned on read/write.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordId, StoredRecord>>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored records.
    pub fn total_bytes(&self) -> u64 {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .map(|record| record.size)
            .sum()
    }

    /// Remove all records from the store.
    pub fn clear(&self) {
        self.records.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all record IDs in the store.
    pub fn all_ids(&self) -> Vec<RecordId> {
        let map = self.records.read().expect("lock poisoned");
        let mut ids: Vec<RecordId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn read(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write(&self, record: &StoredRecord) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        map.insert(record.id, record.clone());
        Ok(())
    }

    fn exists(&self, id: &RecordId) -> StoreResult<bool> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn write_batch(&self, records: &[StoredRecord]) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        for record in records {
            map.insert(record.id, record.clone());
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &count)
            .finish()
    }
}
