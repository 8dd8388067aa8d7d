//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::IngestionPipeline;
use crate::providers::{AnswerSynthesizer, EmbeddingProvider, ProviderSet, VectorStore};
use crate::retrieval::QueryPipeline;
use crate::storage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    store: Arc<dyn VectorStore>,
    ingestion: IngestionPipeline,
    query: QueryPipeline,
}

impl AppState {
    /// Build providers, store and pipelines from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (backend: {:?})...",
            config.backend
        );

        let providers = ProviderSet::from_config(&config)?;
        let store = storage::open_store(&config.vector_db)?;
        tracing::info!("Vector store initialized ({})", store.name());

        Self::from_parts(config, providers.embedder, store, providers.synthesizer)
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Result<Self> {
        let ingestion = IngestionPipeline::new(&config, Arc::clone(&embedder), Arc::clone(&store))?;
        let query = QueryPipeline::new(&config, embedder, Arc::clone(&store), synthesizer);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                ingestion,
                query,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.inner.store
    }

    pub fn ingestion(&self) -> &IngestionPipeline {
        &self.inner.ingestion
    }

    pub fn query(&self) -> &QueryPipeline {
        &self.inner.query
    }
}
