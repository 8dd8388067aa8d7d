//! Document ingestion: extract, chunk, embed, store

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{RagConfig, TimeoutConfig};
use crate::deadline::bounded;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStore};
use crate::types::{Chunk, Document, EmbeddedChunk};

use super::chunker::Chunker;
use super::extractor::TextExtractor;

/// Turns one document into stored records
///
/// A document is stored completely or not at all: any failure before the single
/// store write leaves the store untouched.
#[derive(Clone)]
pub struct IngestionPipeline {
    extractor: TextExtractor,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    timeouts: TimeoutConfig,
    embed_concurrency: usize,
}

impl IngestionPipeline {
    /// Create a pipeline with default extractors and the configured chunking
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: TextExtractor::with_defaults(),
            chunker: Chunker::from_config(config.chunking)?,
            embedder,
            store,
            timeouts: config.timeouts.clone(),
            embed_concurrency: config.ingestion.embed_concurrency(),
        })
    }

    /// Replace the extraction table
    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the chunker
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Ingest a document, returning the number of records stored
    pub async fn ingest(
        &self,
        document: Document,
        source_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<usize> {
        let start = Instant::now();
        let filename = document.filename.clone();
        tracing::info!(
            "Ingesting '{}' ({}, {} bytes)",
            filename,
            document.kind,
            document.size()
        );

        let text = self.extract(document).await?;
        tracing::info!(
            "Extracted {} chars from '{}' in {:?}",
            text.chars().count(),
            filename,
            start.elapsed()
        );

        self.ingest_text(&text, source_id, metadata).await
    }

    /// Ingest already-extracted text
    pub async fn ingest_text(
        &self,
        text: &str,
        source_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<usize> {
        if source_id.trim().is_empty() {
            return Err(Error::invalid("source_id must not be empty"));
        }

        let mut chunks = self.chunker.split(text, source_id);
        for chunk in &mut chunks {
            chunk.merge_metadata(metadata);
        }

        if chunks.is_empty() {
            tracing::warn!("'{}' produced no text, nothing stored", source_id);
            return Ok(0);
        }

        let embed_start = Instant::now();
        let embedded = self.embed_all(chunks).await?;
        tracing::info!(
            "Embedded {} chunks from '{}' in {:?}",
            embedded.len(),
            source_id,
            embed_start.elapsed()
        );

        let deadline = Instant::now() + self.timeouts.store();
        let stored = self.store.add_by(embedded, deadline).await?;

        tracing::info!("Stored {} records for '{}'", stored.len(), source_id);
        Ok(stored.len())
    }

    /// Extract on the blocking pool; a panicking parser counts as a failed extraction
    async fn extract(&self, document: Document) -> Result<String> {
        let extractor = self.extractor.clone();
        let filename = document.filename.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&document));

        let operation = format!("extraction of '{}'", filename);
        let join_name = filename.clone();
        let text = bounded(
            self.timeouts.extraction(),
            &operation,
            move |message| Error::extraction(filename, message),
            async move {
                task.await.map_err(|e| {
                    Error::extraction(join_name, format!("Extractor crashed: {}", e))
                })?
            },
        )
        .await?;
        Ok(text)
    }

    /// Embed chunks with bounded concurrency, in order, stopping at the first failure
    async fn embed_all(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let limit = self.timeouts.embedding();

        let embedder = &self.embedder;
        let embedded: Vec<EmbeddedChunk> = stream::iter(chunks)
            .map(move |chunk| async move {
                let vector = bounded(
                    limit,
                    "chunk embedding",
                    Error::EmbeddingFailure,
                    embedder.embed(&chunk.text),
                )
                .await?;
                Ok::<_, Error>(EmbeddedChunk::new(chunk, vector))
            })
            .buffered(self.embed_concurrency)
            .try_collect()
            .await?;
        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryVectorStore;
    use crate::types::{ScoredRecord, StoredRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct LengthEmbedder {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl LengthEmbedder {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                return Err(Error::embedding("model unloaded"));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    /// Later chunks answer sooner, so completion order is the reverse of input order
    struct ReverseDelayEmbedder {
        total: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for ReverseDelayEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.total.saturating_sub(index) as u64;
            tokio::time::sleep(Duration::from_millis(20 * remaining)).await;
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "reverse-delay"
        }
    }

    /// Store that keeps each `add` batch exactly as received
    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<Vec<usize>>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn add(&self, records: Vec<EmbeddedChunk>) -> Result<Vec<StoredRecord>> {
            self.batches
                .lock()
                .push(records.iter().map(|r| r.chunk.start_offset).collect());
            Ok(records.into_iter().map(StoredRecord::assign).collect())
        }

        async fn add_by(
            &self,
            records: Vec<EmbeddedChunk>,
            _deadline: std::time::Instant,
        ) -> Result<Vec<StoredRecord>> {
            self.add(records).await
        }

        async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<ScoredRecord>> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }

        async fn len(&self) -> Result<usize> {
            Ok(self.batches.lock().iter().map(Vec::len).sum())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn pipeline(embedder: Arc<LengthEmbedder>, store: Arc<MemoryVectorStore>) -> IngestionPipeline {
        IngestionPipeline::new(&RagConfig::default(), embedder, store)
            .unwrap()
            .with_chunker(Chunker::new(10, 2).unwrap())
    }

    #[tokio::test]
    async fn test_stores_every_chunk_in_order() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(Arc::new(LengthEmbedder::new(None)), Arc::clone(&store));

        let text = "abcdefghijklmnopqrstuvwxyz";
        let stored = pipeline
            .ingest_text(text, "alphabet.txt", &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(stored, 3);
        let all = store.search(&[1.0, 0.0], 10).await.unwrap();
        let mut offsets: Vec<usize> = all.iter().map(|r| r.record.chunk.start_offset).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 8, 16]);
    }

    #[tokio::test]
    async fn test_out_of_order_embeddings_are_written_in_chunk_order() {
        let mut config = RagConfig::default();
        config.ingestion.embed_concurrency = Some(4);

        let store = Arc::new(RecordingStore::default());
        let embedder = Arc::new(ReverseDelayEmbedder {
            total: 6,
            calls: AtomicUsize::new(0),
        });
        let pipeline = IngestionPipeline::new(
            &config,
            embedder,
            Arc::clone(&store) as Arc<dyn VectorStore>,
        )
        .unwrap()
        .with_chunker(Chunker::new(10, 2).unwrap());

        // 50 chars, step 8: windows at 0, 8, 16, 24, 32, 40
        let text = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWX";
        let stored = pipeline
            .ingest_text(text, "letters.txt", &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(stored, 6);
        let batches = store.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![0, 8, 16, 24, 32, 40]);
    }

    #[tokio::test]
    async fn test_store_timeout_leaves_store_empty() {
        let mut config = RagConfig::default();
        config.timeouts.store_secs = 0;

        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = IngestionPipeline::new(
            &config,
            Arc::new(LengthEmbedder::new(None)),
            Arc::clone(&store) as Arc<dyn VectorStore>,
        )
        .unwrap()
        .with_chunker(Chunker::new(10, 2).unwrap());

        let err = pipeline
            .ingest_text("abcdefghijklmnopqrstuvwxyz", "alphabet.txt", &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StoreFailure(ref msg) if msg.contains("timed out")));
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(Arc::new(LengthEmbedder::new(Some(1))), Arc::clone(&store));

        let err = pipeline
            .ingest_text("abcdefghijklmnopqrstuvwxyz", "alphabet.txt", &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmbeddingFailure(_)));
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_caller_cannot_override_reserved_keys() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(Arc::new(LengthEmbedder::new(None)), Arc::clone(&store));

        let metadata = BTreeMap::from([
            ("source_id".to_string(), "spoofed".to_string()),
            ("filename".to_string(), "notes.txt".to_string()),
        ]);
        pipeline.ingest_text("short", "notes.txt", &metadata).await.unwrap();

        let record = &store.search(&[1.0, 1.0], 1).await.unwrap()[0].record;
        assert_eq!(record.chunk.extra_metadata["source_id"], "notes.txt");
        assert_eq!(record.chunk.extra_metadata["filename"], "notes.txt");
        assert_eq!(record.chunk.extra_metadata["start_offset"], "0");
    }

    #[tokio::test]
    async fn test_blank_text_stores_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(LengthEmbedder::new(None));
        let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&store));

        let doc = Document::new("empty.txt", &b"   \n  "[..]).unwrap();
        assert_eq!(pipeline.ingest(doc, "empty.txt", &BTreeMap::new()).await.unwrap(), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_embedding() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(LengthEmbedder::new(None));
        let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&store));

        let doc = Document::new("bad.txt", vec![0xff, 0xfe]).unwrap();
        let err = pipeline.ingest(doc, "bad.txt", &BTreeMap::new()).await.unwrap_err();

        assert!(matches!(err, Error::ExtractionFailure { .. }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
