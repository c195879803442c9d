//! Record storage for ChunkVault.
//!
//! A record store is the *persistence sink* of the system: the only component
//! that performs durable I/O. Callers hand it whole records (`write`) or a
//! group of records as one call (`write_batch`); it never interprets record
//! payloads.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileRecordStore`] -- append-only, CRC-framed log file with an in-memory
//!   offset index and explicit compaction
//!
//! # Design Rules
//!
//! 1. Records are mutable: writing a record replaces the previous content
//!    stored under the same [`RecordId`](chunkvault_types::RecordId).
//! 2. Write-then-link: callers write referenced records before (or in the same
//!    batch ahead of) the record that references them.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{CompactionStats, FileRecordStore, FileStoreConfig, SyncMode};
pub use memory::InMemoryRecordStore;
pub use record::StoredRecord;
pub use traits::RecordStore;
