//! Question answering over the stored corpus

use std::sync::Arc;
use std::time::Instant;

use crate::config::{RagConfig, TimeoutConfig};
use crate::deadline::bounded;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{AnswerSynthesizer, EmbeddingProvider, VectorStore};
use crate::types::{Answer, RetrievedContext, ScoredRecord};

/// Embeds a question, gates on relevance and synthesizes a grounded answer
#[derive(Clone)]
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    relevance_threshold: f32,
    timeouts: TimeoutConfig,
}

impl QueryPipeline {
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Self {
        Self {
            embedder,
            store,
            synthesizer,
            relevance_threshold: config.retrieval.relevance_threshold,
            timeouts: config.timeouts.clone(),
        }
    }

    /// Override the minimum top score
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    pub fn relevance_threshold(&self) -> f32 {
        self.relevance_threshold
    }

    /// Answer `question` from the `k` most similar chunks
    ///
    /// Returns [`Answer::not_found`] without consulting the synthesizer when the
    /// store holds nothing relevant enough.
    pub async fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        let start = Instant::now();
        let question = question.trim();
        let Some(retrieved) = self.retrieve(question, k).await? else {
            tracing::info!("No relevant context for question, skipping synthesis");
            return Ok(Answer::not_found());
        };

        let text = bounded(
            self.timeouts.synthesis(),
            "answer synthesis",
            Error::SynthesisFailure,
            self.synthesizer.complete(question, &retrieved.context),
        )
        .await?;

        tracing::info!(
            "Answered from {} chunks in {:?}",
            retrieved.records.len(),
            start.elapsed()
        );
        Ok(Answer::grounded(text, retrieved.records))
    }

    /// Retrieve the gated context for `question` without synthesis
    ///
    /// `None` means nothing passed the relevance gate.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Option<RetrievedContext>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::invalid("Question must not be empty"));
        }
        if k == 0 {
            return Err(Error::invalid("k must be at least 1"));
        }

        let query_vector = bounded(
            self.timeouts.embedding(),
            "question embedding",
            Error::EmbeddingFailure,
            self.embedder.embed(question),
        )
        .await?;

        let results = bounded(
            self.timeouts.store(),
            "store search",
            Error::StoreFailure,
            self.store.search(&query_vector, k),
        )
        .await?;

        if !self.passes_gate(&results) {
            return Ok(None);
        }

        tracing::debug!(
            "Retrieved {} chunks, top score {:.3}",
            results.len(),
            results[0].score
        );
        Ok(Some(RetrievedContext {
            context: PromptBuilder::build_context(&results),
            records: results,
        }))
    }

    fn passes_gate(&self, results: &[ScoredRecord]) -> bool {
        match results.first() {
            None => false,
            Some(best) if best.score < self.relevance_threshold => {
                tracing::debug!(
                    "Top score {:.3} below threshold {:.3}",
                    best.score,
                    self.relevance_threshold
                );
                false
            }
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryVectorStore;
    use crate::types::{Chunk, EmbeddedChunk};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct EchoSynthesizer {
        calls: AtomicUsize,
        last_question: Mutex<Option<String>>,
    }

    #[async_trait]
    impl AnswerSynthesizer for EchoSynthesizer {
        async fn complete(&self, question: &str, context: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_question.lock() = Some(question.to_string());
            Ok(context.to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .add(vec![
                EmbeddedChunk::new(Chunk::new("north", 0, "doc"), vec![1.0, 0.0]),
                EmbeddedChunk::new(Chunk::new("north-east", 5, "doc"), vec![0.8, 0.6]),
                EmbeddedChunk::new(Chunk::new("south", 10, "doc"), vec![-1.0, 0.0]),
            ])
            .await
            .unwrap();
        store
    }

    fn pipeline(
        query: Vec<f32>,
        store: Arc<MemoryVectorStore>,
        synthesizer: Arc<EchoSynthesizer>,
    ) -> QueryPipeline {
        QueryPipeline::new(
            &RagConfig::default(),
            Arc::new(FixedEmbedder(query)),
            store,
            synthesizer,
        )
    }

    #[tokio::test]
    async fn test_context_is_ordered_by_score() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        let pipeline = pipeline(vec![1.0, 0.0], seeded_store().await, Arc::clone(&synthesizer));

        let answer = pipeline.answer("which way?", 2).await.unwrap();
        assert!(answer.is_grounded());
        assert_eq!(answer.text, "north\n\n---\n\nnorth-east");
        assert_eq!(answer.supporting_chunks.len(), 2);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_synthesizer_sees_trimmed_question() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        let pipeline = pipeline(vec![1.0, 0.0], seeded_store().await, Arc::clone(&synthesizer));

        pipeline.answer("  which way?\n", 1).await.unwrap();
        assert_eq!(synthesizer.last_question.lock().as_deref(), Some("which way?"));
    }

    #[tokio::test]
    async fn test_below_threshold_skips_synthesis() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        // Best match is north-east at 0.8
        let pipeline = pipeline(vec![0.0, 1.0], seeded_store().await, Arc::clone(&synthesizer))
            .with_threshold(0.9);

        let answer = pipeline.answer("which way?", 3).await.unwrap();
        assert!(!answer.is_grounded());
        assert_eq!(answer.text, "Unable to find matching results.");
        assert!(answer.supporting_chunks.is_empty());
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_store_returns_not_found() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        let pipeline = pipeline(
            vec![1.0, 0.0],
            Arc::new(MemoryVectorStore::new()),
            Arc::clone(&synthesizer),
        );

        let answer = pipeline.answer("anything?", 4).await.unwrap();
        assert_eq!(answer.text, "Unable to find matching results.");
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let pipeline = pipeline(
            vec![1.0, 0.0],
            seeded_store().await,
            Arc::new(EchoSynthesizer::default()),
        );

        assert!(matches!(pipeline.answer("   ", 4).await, Err(Error::InvalidInput(_))));
        assert!(matches!(pipeline.answer("why?", 0).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_retrieve_returns_context_only() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        let pipeline = pipeline(vec![1.0, 0.0], seeded_store().await, Arc::clone(&synthesizer));

        let retrieved = pipeline.retrieve("which way?", 1).await.unwrap().unwrap();
        assert_eq!(retrieved.context, "north");
        assert_eq!(retrieved.records[0].record.chunk.start_offset, 0);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }
}
