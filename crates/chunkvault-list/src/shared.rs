use std::sync::{Arc, RwLock};

use chunkvault_store::RecordStore;
use chunkvault_types::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ListConfig;
use crate::error::{ListError, ListResult};
use crate::list::ChunkedList;

/// A [`ChunkedList`] bound to its store and guarded by a reader/writer lock.
///
/// Reads (`size`, `get`, `to_vec`) share the lock; chunk loads triggered by a
/// read happen under the shared lock. Mutations (`append`, `append_all`,
/// `clear`) take it exclusively, so they never interleave with each other or
/// with reads.
pub struct SharedChunkedList<T, S: ?Sized> {
    store: Arc<S>,
    list: RwLock<ChunkedList<T>>,
}

impl<T, S: RecordStore + ?Sized> SharedChunkedList<T, S> {
    pub fn new(list: ChunkedList<T>, store: Arc<S>) -> Self {
        Self {
            store,
            list: RwLock::new(list),
        }
    }

    /// Reopen the list stored under `id`, or create it empty.
    pub fn open_or_create(id: RecordId, config: &ListConfig, store: Arc<S>) -> ListResult<Self> {
        let list = ChunkedList::open_or_create(id, config, &*store)?;
        Ok(Self::new(list, store))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `f` with shared access to the list.
    pub fn read<R>(
        &self,
        f: impl FnOnce(&ChunkedList<T>, &S) -> ListResult<R>,
    ) -> ListResult<R> {
        let list = self
            .list
            .read()
            .map_err(|_| ListError::LockPoisoned("read"))?;
        f(&*list, &*self.store)
    }

    /// Run `f` with exclusive access to the list.
    pub fn write<R>(
        &self,
        f: impl FnOnce(&mut ChunkedList<T>, &S) -> ListResult<R>,
    ) -> ListResult<R> {
        let mut list = self
            .list
            .write()
            .map_err(|_| ListError::LockPoisoned("write"))?;
        f(&mut *list, &*self.store)
    }

    pub fn id(&self) -> ListResult<RecordId> {
        self.read(|list, _| Ok(list.id()))
    }

    /// Drop resident chunks that are already durable.
    pub fn release_resident(&self) -> ListResult<usize> {
        self.write(|list, _| Ok(list.release_resident()))
    }
}

impl<T: DeserializeOwned, S: RecordStore + ?Sized> SharedChunkedList<T, S> {
    pub fn size(&self) -> ListResult<u64> {
        self.read(|list, store| list.size(store))
    }
}

impl<T: Clone + DeserializeOwned, S: RecordStore + ?Sized> SharedChunkedList<T, S> {
    /// Copy of the element at `index`.
    pub fn get(&self, index: u64) -> ListResult<T> {
        self.read(|list, store| list.get(index, store).cloned())
    }

    /// Copy of every element, in order.
    pub fn to_vec(&self) -> ListResult<Vec<T>> {
        self.read(|list, store| list.iter(store).map(|item| item.cloned()).collect())
    }
}

impl<T: Serialize + DeserializeOwned, S: RecordStore + ?Sized> SharedChunkedList<T, S> {
    pub fn append(&self, item: T) -> ListResult<()> {
        self.write(|list, store| list.append(item, store))
    }

    pub fn append_all<I: IntoIterator<Item = T>>(&self, items: I) -> ListResult<()> {
        self.write(|list, store| list.append_all(items, store))
    }

    /// Empty the list and delete the chunk records it no longer references.
    ///
    /// The directory is written before any chunk is deleted. Returns the
    /// number of chunk records removed from the store.
    pub fn clear(&self) -> ListResult<usize> {
        self.write(|list, store| {
            let discarded = list.clear(store)?;
            let mut deleted = 0;
            for id in &discarded {
                if store.delete(id)? {
                    deleted += 1;
                }
            }
            debug!(list = %list.id().short_id(), deleted, "orphaned chunks deleted");
            Ok(deleted)
        })
    }
}

impl<T, S: ?Sized> std::fmt::Debug for SharedChunkedList<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.list.try_read() {
            Ok(list) => f
                .debug_struct("SharedChunkedList")
                .field("list", &*list)
                .finish(),
            Err(_) => f
                .debug_struct("SharedChunkedList")
                .field("list", &"<locked>")
                .finish(),
        }
    }
}
