//! Vector store trait for persisting and searching embedded chunks

use async_trait::async_trait;
use std::time::Instant;

use crate::error::Result;
use crate::types::{EmbeddedChunk, ScoredRecord, StoredRecord};

/// Trait for vector storage and similarity search
///
/// Stores serialize their own writes; an `add` is all-or-nothing and every
/// vector in a store has the same length.
///
/// Implementations:
/// - `SqliteVectorStore`: durable store addressed by file path
/// - `MemoryVectorStore`: in-process store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist records in one logical operation, returning them with their ids
    async fn add(&self, records: Vec<EmbeddedChunk>) -> Result<Vec<StoredRecord>>;

    /// Like `add`, but a write that cannot commit before `deadline` is rolled
    /// back and reported as a `StoreFailure`. The call waits for that outcome.
    async fn add_by(&self, records: Vec<EmbeddedChunk>, deadline: Instant)
        -> Result<Vec<StoredRecord>>;

    /// Find the `k` most similar records, descending by score
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>>;

    /// Delete every record
    async fn clear(&self) -> Result<()>;

    /// Get total number of records stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
