use chunkvault_types::RecordId;

use crate::error::StoreResult;
use crate::record::StoredRecord;

/// Durable record store (the persistence sink).
///
/// All implementations must satisfy these invariants:
/// - `write` creates the record if absent and replaces it otherwise.
/// - `write_batch` has the same effect as calling `write` for each record in
///   order; no atomicity beyond that is promised.
/// - A successful `write` is visible to every later `read`.
/// - All I/O errors are propagated, never silently ignored.
pub trait RecordStore: Send + Sync {
    /// Read a record by ID.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    fn read(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>>;

    /// Write (create or replace) a record.
    fn write(&self, record: &StoredRecord) -> StoreResult<()>;

    /// Check whether a record exists in the store.
    fn exists(&self, id: &RecordId) -> StoreResult<bool>;

    /// Delete a record by ID. Returns `true` if the record existed.
    fn delete(&self, id: &RecordId) -> StoreResult<bool>;

    /// Write multiple records as one logical call.
    ///
    /// Default implementation calls `write()` for each record. Backends may
    /// override for better performance (e.g., single fsync).
    fn write_batch(&self, records: &[StoredRecord]) -> StoreResult<()> {
        records.iter().try_for_each(|record| self.write(record))
    }
}
