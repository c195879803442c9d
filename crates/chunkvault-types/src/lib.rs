//! Foundation types for ChunkVault.
//!
//! Every durable object ChunkVault writes is a *record*: a mutable unit of
//! storage with a stable identity. Unlike content-addressed objects, a record
//! keeps its identity while its content changes (a chunk grows, a directory
//! gains entries), so records are keyed by a time-ordered UUID rather than a
//! content hash.
//!
//! # Key Types
//!
//! - [`RecordId`] -- Stable record identifier (UUID v7)
//! - [`RecordKind`] -- What a record holds: a chunk directory or a chunk
//! - [`TypeError`] -- Parse failures for record ids

pub mod error;
pub mod record;

pub use error::TypeError;
pub use record::{RecordId, RecordKind};
