use serde::{Deserialize, Serialize};

use crate::error::{ListError, ListResult};

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

/// Configuration for a [`ChunkedList`](crate::ChunkedList).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// Maximum number of elements per chunk. Fixed for the life of a list.
    pub chunk_size: u32,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ListConfig {
    /// Configuration with the given chunk size.
    pub fn with_chunk_size(chunk_size: u32) -> Self {
        Self { chunk_size }
    }

    /// Reject configurations a list cannot operate with.
    pub fn validate(&self) -> ListResult<()> {
        if self.chunk_size == 0 {
            return Err(ListError::InvalidConfiguration(
                "chunk_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
