use std::sync::OnceLock;

use chunkvault_store::{RecordStore, StoredRecord};
use chunkvault_types::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::chunk::Chunk;
use crate::error::{ListError, ListResult};

/// Deferred reference to one chunk.
///
/// A handle is either *resident* (the chunk is in memory) or a *stub* that
/// knows only the chunk's record id and loads it from a [`RecordStore`] on
/// first access. Loading goes through `&self`, so readers holding a shared
/// borrow can materialize chunks; concurrent loads of the same handle keep
/// whichever copy lands first.
///
/// `persisted` is true when the durable record matches the resident content
/// (always true for a stub). Only persisted handles may be unloaded.
pub struct LazyChunk<T> {
    id: RecordId,
    slot: OnceLock<Chunk<T>>,
    persisted: bool,
}

impl<T> LazyChunk<T> {
    /// Wrap a freshly created chunk. It has never been written.
    pub fn resident(id: RecordId, chunk: Chunk<T>) -> Self {
        Self {
            id,
            slot: OnceLock::from(chunk),
            persisted: false,
        }
    }

    /// Reference a chunk that exists only in the store.
    pub fn stub(id: RecordId) -> Self {
        Self {
            id,
            slot: OnceLock::new(),
            persisted: true,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn is_resident(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Drop the resident chunk so the next access reloads it.
    ///
    /// Returns `false` (and keeps the chunk) when the handle holds changes
    /// that were never written, or when nothing is resident.
    pub fn unload(&mut self) -> bool {
        if !self.persisted {
            return false;
        }
        self.slot.take().is_some()
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

impl<T: DeserializeOwned> LazyChunk<T> {
    /// The chunk, loaded from `store` if not resident.
    pub fn get<S: RecordStore + ?Sized>(&self, store: &S) -> ListResult<&Chunk<T>> {
        if let Some(chunk) = self.slot.get() {
            return Ok(chunk);
        }
        let chunk = self.load(store)?;
        Ok(self.slot.get_or_init(|| chunk))
    }

    /// Mutable access for appending. Marks the handle as not persisted.
    pub(crate) fn get_mut<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> ListResult<&mut Chunk<T>> {
        if self.slot.get().is_none() {
            self.slot = OnceLock::from(self.load(store)?);
        }
        self.persisted = false;
        Ok(self.slot.get_mut().expect("slot filled above"))
    }

    fn load<S: RecordStore + ?Sized>(&self, store: &S) -> ListResult<Chunk<T>> {
        let record = store
            .read(&self.id)?
            .ok_or(ListError::MissingRecord(self.id))?;
        let chunk = Chunk::from_stored_record(&record)?;
        debug!(chunk = %self.id.short_id(), len = chunk.len(), "chunk loaded");
        Ok(chunk)
    }
}

impl<T: Serialize> LazyChunk<T> {
    /// Encoded chunk if it holds changes the store has not seen.
    pub(crate) fn dirty_record(&self) -> ListResult<Option<StoredRecord>> {
        if self.persisted {
            return Ok(None);
        }
        match self.slot.get() {
            Some(chunk) => chunk.to_stored_record(self.id).map(Some),
            None => Ok(None),
        }
    }
}

impl<T> std::fmt::Debug for LazyChunk<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyChunk")
            .field("id", &self.id)
            .field("resident", &self.is_resident())
            .field("persisted", &self.persisted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStore;

    fn stored_chunk(store: &RecordingStore, items: &[u32]) -> RecordId {
        let id = RecordId::new();
        let mut chunk = Chunk::with_capacity(4);
        for item in items {
            chunk.push(*item);
        }
        store.write(&chunk.to_stored_record(id).unwrap()).unwrap();
        store.reset();
        id
    }

    #[test]
    fn fresh_handle_is_resident_and_unpersisted() {
        let handle = LazyChunk::resident(RecordId::new(), Chunk::<u32>::with_capacity(2));
        assert!(handle.is_resident());
        assert!(!handle.is_persisted());
        assert!(handle.dirty_record().unwrap().is_some());
    }

    #[test]
    fn stub_loads_once_then_stays_resident() {
        let store = RecordingStore::new();
        let id = stored_chunk(&store, &[1, 2, 3]);
        let handle: LazyChunk<u32> = LazyChunk::stub(id);
        assert!(!handle.is_resident());

        assert_eq!(handle.get(&store).unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(handle.get(&store).unwrap().len(), 3);
        assert_eq!(store.reads(), vec![id]);
        assert!(handle.is_resident());
        assert!(handle.dirty_record().unwrap().is_none());
    }

    #[test]
    fn missing_record_is_reported() {
        let store = RecordingStore::new();
        let id = RecordId::new();
        let handle: LazyChunk<u32> = LazyChunk::stub(id);
        assert!(matches!(
            handle.get(&store),
            Err(ListError::MissingRecord(missing)) if missing == id
        ));
    }

    #[test]
    fn unload_requires_persisted_content() {
        let store = RecordingStore::new();
        let mut handle = LazyChunk::resident(RecordId::new(), Chunk::<u32>::with_capacity(2));
        assert!(!handle.unload());
        assert!(handle.is_resident());

        store.write(&handle.dirty_record().unwrap().unwrap()).unwrap();
        handle.mark_persisted();
        assert!(handle.unload());
        assert!(!handle.is_resident());
        assert!(!handle.unload());
    }

    #[test]
    fn unloaded_handle_reloads_transparently() {
        let store = RecordingStore::new();
        let id = stored_chunk(&store, &[9]);
        let mut handle: LazyChunk<u32> = LazyChunk::stub(id);
        handle.get(&store).unwrap();
        assert!(handle.unload());

        assert_eq!(handle.get(&store).unwrap().as_slice(), &[9]);
        assert_eq!(store.reads(), vec![id, id]);
    }

    #[test]
    fn get_mut_on_resident_chunk_reads_nothing() {
        let store = RecordingStore::new();
        let mut handle = LazyChunk::resident(RecordId::new(), Chunk::<u32>::with_capacity(2));
        handle.get_mut(&store).unwrap().push(5);
        assert!(store.reads().is_empty());
        assert_eq!(handle.get(&store).unwrap().as_slice(), &[5]);
    }

    #[test]
    fn get_mut_loads_and_marks_dirty() {
        let store = RecordingStore::new();
        let id = stored_chunk(&store, &[1]);
        let mut handle: LazyChunk<u32> = LazyChunk::stub(id);

        handle.get_mut(&store).unwrap().push(2);
        assert!(!handle.is_persisted());
        assert!(!handle.unload());

        let record = handle.dirty_record().unwrap().unwrap();
        let decoded: Chunk<u32> = Chunk::from_stored_record(&record).unwrap();
        assert_eq!(decoded.as_slice(), &[1, 2]);
    }
}
