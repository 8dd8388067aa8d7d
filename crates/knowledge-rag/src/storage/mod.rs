//! Vector storage backends
//!
//! Both stores rank by brute-force cosine similarity, mapped onto [0, 1].

mod memory;
mod sqlite;

use std::sync::Arc;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::VectorStore;
use crate::types::{ScoredRecord, StoredRecord};

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Open the store described by configuration
pub fn open_store(config: &VectorDbConfig) -> Result<Arc<dyn VectorStore>> {
    if config.is_in_memory() {
        tracing::info!("Using in-memory vector store");
        return Ok(Arc::new(MemoryVectorStore::new()));
    }

    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tracing::info!("Opening vector store at {}", config.path.display());
    Ok(Arc::new(SqliteVectorStore::open(&config.path)?))
}

/// Cosine similarity mapped from [-1, 1] to [0, 1]
///
/// Zero-norm vectors score 0.5, the same as orthogonal ones.
pub fn relevance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    let cosine = if denom > 0.0 { dot / denom } else { 0.0 };
    ((1.0 + cosine) / 2.0).clamp(0.0, 1.0)
}

/// Reject vectors whose length differs from the store's
pub(crate) fn check_dimension(expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(dim) if dim != actual => Err(Error::store(format!(
            "Vector dimension mismatch: store holds {}, got {}",
            dim, actual
        ))),
        _ => Ok(()),
    }
}

/// Score every record against `query` and keep the best `k`, descending
pub(crate) fn top_k<I>(records: I, query: &[f32], k: usize) -> Vec<ScoredRecord>
where
    I: IntoIterator<Item = StoredRecord>,
{
    let mut scored: Vec<ScoredRecord> = records
        .into_iter()
        .map(|record| {
            let score = relevance(query, &record.vector);
            ScoredRecord { record, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
