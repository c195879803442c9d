//! Chunked, lazily loaded list with incremental persistence.
//!
//! A [`ChunkedList`] stores an ordered, append-only sequence as a directory
//! of fixed-size chunks. Each chunk is a separate record in a
//! [`RecordStore`](chunkvault_store::RecordStore), referenced through a
//! [`LazyChunk`] handle that loads it on first access. Mutations write only
//! the records they changed:
//!
//! - appending into a chunk with room writes that chunk;
//! - opening a new chunk writes the directory, preceded by the chunks the
//!   store has not yet seen;
//! - `clear` writes the now-empty directory.
//!
//! The list itself is unsynchronized. [`SharedChunkedList`] wraps it in a
//! reader/writer lock so many readers and one writer can share it.
//!
//! # Example
//!
//! ```
//! use chunkvault_list::{ChunkedList, ListConfig};
//! use chunkvault_store::InMemoryRecordStore;
//!
//! let store = InMemoryRecordStore::new();
//! let mut list = ChunkedList::new(&ListConfig::with_chunk_size(2)).unwrap();
//! list.append_all(["a", "b", "c"].map(String::from), &store).unwrap();
//!
//! assert_eq!(list.size(&store).unwrap(), 3);
//! assert_eq!(list.get(2, &store).unwrap(), "c");
//! assert_eq!(list.chunk_count(), 2);
//! ```

pub mod chunk;
pub mod config;
pub mod directory;
pub mod error;
pub mod lazy;
pub mod list;
pub mod shared;

#[cfg(test)]
mod testing;

pub use chunk::Chunk;
pub use config::{ListConfig, DEFAULT_CHUNK_SIZE};
pub use directory::DirectoryRecord;
pub use error::{ListError, ListResult};
pub use lazy::LazyChunk;
pub use list::{ChunkedList, Iter};
pub use shared::SharedChunkedList;
