use chunkvault_store::StoreError;
use chunkvault_types::RecordId;

/// Errors produced by chunked list operations.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// `get` was called with an index at or past the end of the list.
    #[error("index {index} out of range")]
    IndexOutOfRange { index: u64 },

    /// The list size does not fit in a `u64`.
    #[error("list size exceeds the representable range")]
    ArithmeticOverflow,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Failure raised by the record store, passed through unchanged.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// A referenced record is absent from the store.
    #[error("record not found: {0}")]
    MissingRecord(RecordId),

    /// A record exists but does not decode as what references it expect.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: RecordId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A thread panicked while holding the list lock.
    #[error("list {0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Result alias for list operations.
pub type ListResult<T> = Result<T, ListError>;
