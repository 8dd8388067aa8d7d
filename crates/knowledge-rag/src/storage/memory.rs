//! In-process vector store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::providers::VectorStore;
use crate::types::{EmbeddedChunk, ScoredRecord, StoredRecord};

use super::{check_dimension, top_k};

/// Vector store held entirely in memory, lost on restart
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn dimension(records: &[StoredRecord]) -> Option<usize> {
        records.first().map(|r| r.vector.len())
    }

    fn insert(
        stored: &mut Vec<StoredRecord>,
        records: Vec<EmbeddedChunk>,
        deadline: Option<Instant>,
    ) -> Result<Vec<StoredRecord>> {
        // Validate the whole batch before touching the store
        let mut expected = Self::dimension(stored);
        for record in &records {
            if record.vector.is_empty() {
                return Err(Error::store("Cannot store an empty vector"));
            }
            check_dimension(expected, record.vector.len())?;
            expected = Some(record.vector.len());
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(missed_deadline());
        }

        let assigned: Vec<StoredRecord> = records.into_iter().map(StoredRecord::assign).collect();
        stored.extend(assigned.iter().cloned());
        Ok(assigned)
    }
}

fn missed_deadline() -> Error {
    tracing::error!("TIMEOUT: store add missed its deadline, nothing stored");
    Error::store("store add timed out; write rolled back")
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, records: Vec<EmbeddedChunk>) -> Result<Vec<StoredRecord>> {
        Self::insert(&mut self.records.write(), records, None)
    }

    async fn add_by(
        &self,
        records: Vec<EmbeddedChunk>,
        deadline: Instant,
    ) -> Result<Vec<StoredRecord>> {
        let mut stored = self
            .records
            .try_write_until(deadline)
            .ok_or_else(missed_deadline)?;
        Self::insert(&mut stored, records, Some(deadline))
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read();
        if stored.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        check_dimension(Self::dimension(&stored), query.len())?;
        Ok(top_k(stored.iter().cloned(), query, k))
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
