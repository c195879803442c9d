use chunkvault_store::RecordStore;
use chunkvault_types::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::chunk::Chunk;
use crate::config::ListConfig;
use crate::directory::DirectoryRecord;
use crate::error::{ListError, ListResult};
use crate::lazy::LazyChunk;

/// An append-only list split into fixed-size chunks that load on demand.
///
/// The list owns a *directory*: one [`LazyChunk`] handle per chunk, in
/// creation order. Every chunk except the last holds exactly `chunk_size`
/// elements; the last holds between 1 and `chunk_size`. An empty list has no
/// chunks at all.
///
/// Mutations hand the store only what changed:
///
/// - an append that fits in the last chunk writes that chunk alone;
/// - an append that opens a new chunk writes the directory, together with
///   every chunk whose content the store has not yet seen (the new chunk,
///   written before the directory that references it).
///
/// The list has no internal locking. Callers serialize mutations and may
/// share reads; see [`SharedChunkedList`](crate::SharedChunkedList).
pub struct ChunkedList<T> {
    id: RecordId,
    chunk_size: u32,
    directory: Vec<LazyChunk<T>>,
    /// The directory's chunk list differs from what the store holds.
    directory_dirty: bool,
}

impl<T> ChunkedList<T> {
    /// Create an empty list with a fresh directory id.
    pub fn new(config: &ListConfig) -> ListResult<Self> {
        Self::with_id(RecordId::new(), config)
    }

    /// Create an empty list whose directory is stored under `id`.
    pub fn with_id(id: RecordId, config: &ListConfig) -> ListResult<Self> {
        config.validate()?;
        Ok(Self {
            id,
            chunk_size: config.chunk_size,
            directory: Vec::new(),
            directory_dirty: false,
        })
    }

    /// Reopen a list from its persisted directory.
    ///
    /// Only the directory record is read; every chunk starts as an unloaded
    /// stub.
    pub fn open<S: RecordStore + ?Sized>(id: RecordId, store: &S) -> ListResult<Self> {
        let record = store.read(&id)?.ok_or(ListError::MissingRecord(id))?;
        let directory = DirectoryRecord::from_stored_record(&record)?;
        debug!(
            list = %id.short_id(),
            chunk_size = directory.chunk_size,
            chunks = directory.chunks.len(),
            "list opened"
        );
        Ok(Self {
            id,
            chunk_size: directory.chunk_size,
            directory: directory.chunks.into_iter().map(LazyChunk::stub).collect(),
            directory_dirty: false,
        })
    }

    /// Reopen the list stored under `id`, or create it empty if absent.
    ///
    /// An existing list keeps the chunk size it was created with.
    pub fn open_or_create<S: RecordStore + ?Sized>(
        id: RecordId,
        config: &ListConfig,
        store: &S,
    ) -> ListResult<Self> {
        if store.exists(&id)? {
            let list = Self::open(id, store)?;
            if list.chunk_size != config.chunk_size {
                debug!(
                    list = %id.short_id(),
                    stored = list.chunk_size,
                    requested = config.chunk_size,
                    "keeping stored chunk size"
                );
            }
            Ok(list)
        } else {
            Self::with_id(id, config)
        }
    }

    /// Record id of the directory.
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Number of chunks currently held in memory.
    pub fn resident_chunks(&self) -> usize {
        self.directory.iter().filter(|h| h.is_resident()).count()
    }

    /// Drop every resident chunk whose content is already durable.
    ///
    /// This is the hook for the embedding runtime to reclaim memory; later
    /// reads reload released chunks from the store. Returns how many chunks
    /// were released.
    pub fn release_resident(&mut self) -> usize {
        let mut released = 0;
        for handle in &mut self.directory {
            if handle.unload() {
                released += 1;
            }
        }
        debug!(list = %self.id.short_id(), released, "released resident chunks");
        released
    }

    fn push_chunk(&mut self) {
        let id = RecordId::new();
        self.directory
            .push(LazyChunk::resident(id, Chunk::with_capacity(self.chunk_size)));
        self.directory_dirty = true;
        debug!(
            list = %self.id.short_id(),
            chunk = %id.short_id(),
            index = self.directory.len() - 1,
            "chunk created"
        );
    }
}

impl<T: DeserializeOwned> ChunkedList<T> {
    /// Element at `index`, loading only the chunk that holds it.
    pub fn get<S: RecordStore + ?Sized>(&self, index: u64, store: &S) -> ListResult<&T> {
        let chunk_size = u64::from(self.chunk_size);
        let handle = usize::try_from(index / chunk_size)
            .ok()
            .and_then(|chunk_index| self.directory.get(chunk_index))
            .ok_or(ListError::IndexOutOfRange { index })?;

        // Below chunk_size, which is a u32.
        let offset = (index % chunk_size) as usize;
        handle
            .get(store)?
            .get(offset)
            .ok_or(ListError::IndexOutOfRange { index })
    }

    /// Number of elements. Loads at most the last chunk.
    pub fn size<S: RecordStore + ?Sized>(&self, store: &S) -> ListResult<u64> {
        let Some(tail) = self.directory.last() else {
            return Ok(0);
        };
        let sealed = u64::try_from(self.directory.len() - 1)
            .map_err(|_| ListError::ArithmeticOverflow)?;
        let tail_len =
            u64::try_from(tail.get(store)?.len()).map_err(|_| ListError::ArithmeticOverflow)?;
        total_size(sealed, self.chunk_size, tail_len)
    }

    /// Iterate over all elements in insertion order, loading chunks as the
    /// iteration reaches them.
    ///
    /// Each call starts a fresh traversal. A load failure is yielded once and
    /// ends the iteration.
    pub fn iter<'a, S: RecordStore + ?Sized>(&'a self, store: &'a S) -> Iter<'a, T, S> {
        self.iter_from(0, store)
    }

    /// Iterate from element `index` onwards.
    ///
    /// Chunks before the one holding `index` are never loaded. An `index` at
    /// or past the end yields nothing.
    pub fn iter_from<'a, S: RecordStore + ?Sized>(
        &'a self,
        index: u64,
        store: &'a S,
    ) -> Iter<'a, T, S> {
        let chunk_size = u64::from(self.chunk_size);
        let first = usize::try_from(index / chunk_size).map_or(self.directory.len(), |first| {
            first.min(self.directory.len())
        });
        Iter {
            chunks: self.directory[first..].iter(),
            current: [].iter(),
            // Below chunk_size, which is a u32.
            skip: (index % chunk_size) as usize,
            store,
            done: false,
        }
    }

    fn tail_has_room<S: RecordStore + ?Sized>(&self, store: &S) -> ListResult<bool> {
        match self.directory.last() {
            Some(tail) => Ok(!tail.get(store)?.is_full(self.chunk_size)),
            None => Ok(false),
        }
    }
}

impl<T: Serialize + DeserializeOwned> ChunkedList<T> {
    /// Create an empty list under `id` and write its directory right away,
    /// so it can be reopened before anything is appended.
    pub fn create<S: RecordStore + ?Sized>(
        id: RecordId,
        config: &ListConfig,
        store: &S,
    ) -> ListResult<Self> {
        let mut list = Self::with_id(id, config)?;
        list.directory_dirty = true;
        list.persist_directory(store)?;
        Ok(list)
    }

    /// Append one element.
    ///
    /// Writes only the last chunk, unless the element opens a new chunk, in
    /// which case the directory (carrying the new chunk) is written instead.
    pub fn append<S: RecordStore + ?Sized>(&mut self, item: T, store: &S) -> ListResult<()> {
        if !self.tail_has_room(store)? {
            self.push_chunk();
        }

        let tail = self.directory.len() - 1;
        self.directory[tail].get_mut(store)?.push(item);

        if self.directory_dirty {
            self.persist_directory(store)
        } else {
            self.persist_tail(store)
        }
    }

    /// Append every element of `items`, in order.
    ///
    /// Each time a chunk fills up and a new one is opened, the sealed chunk
    /// and the directory are written together in one batch. The last chunk is
    /// written once at the end. An empty `items` writes nothing.
    ///
    /// There is no rollback: if the store fails midway, the elements already
    /// placed stay in memory even though the store has not seen them all.
    pub fn append_all<I, S>(&mut self, items: I, store: &S) -> ListResult<()>
    where
        I: IntoIterator<Item = T>,
        S: RecordStore + ?Sized,
    {
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            return Ok(());
        }

        if self.directory.is_empty() {
            self.push_chunk();
            self.persist_directory(store)?;
        }

        let mut sealed = 0usize;
        for item in items {
            if !self.tail_has_room(store)? {
                self.push_chunk();
                self.persist_directory(store)?;
                sealed += 1;
            }
            let tail = self.directory.len() - 1;
            self.directory[tail].get_mut(store)?.push(item);
        }

        debug!(list = %self.id.short_id(), sealed, "batch appended");
        if self.directory_dirty {
            self.persist_directory(store)
        } else {
            self.persist_tail(store)
        }
    }

    /// Drop every chunk and write the now-empty directory.
    ///
    /// Returns the ids of the discarded chunk records. They are no longer
    /// referenced and may be deleted from the store by the caller.
    ///
    /// The empty directory is written first. If that write fails the list
    /// keeps every chunk, so no chunk id is lost.
    pub fn clear<S: RecordStore + ?Sized>(&mut self, store: &S) -> ListResult<Vec<RecordId>> {
        let empty = DirectoryRecord {
            chunk_size: self.chunk_size,
            chunks: Vec::new(),
        };
        store.write(&empty.to_stored_record(self.id)?)?;

        let discarded: Vec<RecordId> = self.directory.drain(..).map(|h| h.id()).collect();
        self.directory_dirty = false;
        debug!(list = %self.id.short_id(), discarded = discarded.len(), "list cleared");
        Ok(discarded)
    }

    fn directory_record(&self) -> DirectoryRecord {
        DirectoryRecord {
            chunk_size: self.chunk_size,
            chunks: self.directory.iter().map(LazyChunk::id).collect(),
        }
    }

    /// Write the directory, preceded by every chunk with unwritten content.
    fn persist_directory<S: RecordStore + ?Sized>(&mut self, store: &S) -> ListResult<()> {
        let mut batch = Vec::new();
        let mut dirty = Vec::new();
        for (index, handle) in self.directory.iter().enumerate() {
            if let Some(record) = handle.dirty_record()? {
                batch.push(record);
                dirty.push(index);
            }
        }
        batch.push(self.directory_record().to_stored_record(self.id)?);

        if let [record] = batch.as_slice() {
            store.write(record)?;
        } else {
            store.write_batch(&batch)?;
        }

        for index in dirty {
            self.directory[index].mark_persisted();
        }
        self.directory_dirty = false;
        debug!(
            list = %self.id.short_id(),
            chunks = self.directory.len(),
            records = batch.len(),
            "directory persisted"
        );
        Ok(())
    }

    /// Write the last chunk if it holds unwritten content.
    fn persist_tail<S: RecordStore + ?Sized>(&mut self, store: &S) -> ListResult<()> {
        let Some(tail) = self.directory.last_mut() else {
            return Ok(());
        };
        if let Some(record) = tail.dirty_record()? {
            store.write(&record)?;
            tail.mark_persisted();
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for ChunkedList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedList")
            .field("id", &self.id)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_count", &self.directory.len())
            .field("resident_chunks", &self.resident_chunks())
            .finish()
    }
}

/// `sealed_chunks * chunk_size + tail_len`, or `ArithmeticOverflow`.
fn total_size(sealed_chunks: u64, chunk_size: u32, tail_len: u64) -> ListResult<u64> {
    sealed_chunks
        .checked_mul(u64::from(chunk_size))
        .and_then(|n| n.checked_add(tail_len))
        .ok_or(ListError::ArithmeticOverflow)
}

/// Iterator returned by [`ChunkedList::iter`].
pub struct Iter<'a, T, S: ?Sized> {
    chunks: std::slice::Iter<'a, LazyChunk<T>>,
    current: std::slice::Iter<'a, T>,
    /// Elements to pass over in the first chunk loaded.
    skip: usize,
    store: &'a S,
    done: bool,
}

impl<'a, T, S> Iterator for Iter<'a, T, S>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    type Item = ListResult<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            let handle = self.chunks.next()?;
            match handle.get(self.store) {
                Ok(chunk) => {
                    let start = std::mem::take(&mut self.skip);
                    self.current = chunk.as_slice().get(start..).unwrap_or(&[]).iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
