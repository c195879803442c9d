//! Store double that records every call made to it.

use std::io;
use std::sync::Mutex;

use chunkvault_store::{InMemoryRecordStore, RecordStore, StoreError, StoreResult, StoredRecord};
use chunkvault_types::{RecordId, RecordKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Write(RecordKind, RecordId),
    Batch(Vec<(RecordKind, RecordId)>),
}

impl Call {
    /// Every record id this call wrote.
    pub(crate) fn ids(&self) -> Vec<RecordId> {
        match self {
            Self::Write(_, id) => vec![*id],
            Self::Batch(records) => records.iter().map(|(_, id)| *id).collect(),
        }
    }

    pub(crate) fn touches_directory(&self) -> bool {
        match self {
            Self::Write(kind, _) => *kind == RecordKind::Directory,
            Self::Batch(records) => records.iter().any(|(k, _)| *k == RecordKind::Directory),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: InMemoryRecordStore,
    calls: Mutex<Vec<Call>>,
    reads: Mutex<Vec<RecordId>>,
    /// Number of write calls still allowed to succeed.
    budget: Mutex<Option<usize>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn reads(&self) -> Vec<RecordId> {
        self.reads.lock().unwrap().clone()
    }

    pub(crate) fn reset(&self) {
        self.calls.lock().unwrap().clear();
        self.reads.lock().unwrap().clear();
    }

    /// Let `n` more write calls succeed, then fail every later one.
    pub(crate) fn fail_after(&self, n: usize) {
        *self.budget.lock().unwrap() = Some(n);
    }

    pub(crate) fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    fn spend(&self) -> StoreResult<()> {
        let mut budget = self.budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => Err(StoreError::Io(io::Error::other("injected write failure"))),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl RecordStore for RecordingStore {
    fn read(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>> {
        self.reads.lock().unwrap().push(*id);
        self.inner.read(id)
    }

    fn write(&self, record: &StoredRecord) -> StoreResult<()> {
        self.spend()?;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Write(record.kind, record.id));
        self.inner.write(record)
    }

    fn exists(&self, id: &RecordId) -> StoreResult<bool> {
        self.inner.exists(id)
    }

    fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        self.inner.delete(id)
    }

    fn write_batch(&self, records: &[StoredRecord]) -> StoreResult<()> {
        self.spend()?;
        self.calls.lock().unwrap().push(Call::Batch(
            records.iter().map(|r| (r.kind, r.id)).collect(),
        ));
        self.inner.write_batch(records)
    }
}
