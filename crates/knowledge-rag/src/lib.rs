//! knowledge-rag: document ingestion and grounded question answering
//!
//! Uploaded PDF, Word and plain text documents are split into overlapping
//! character windows, embedded, and stored in a vector store. Questions are
//! embedded the same way; when the best match is relevant enough, the matching
//! chunks are handed to an LLM that answers from them alone.
//!
//! The embedding model, the LLM and the vector store are pluggable through the
//! traits in [`providers`].

pub mod config;
pub mod deadline;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{Chunker, IngestionPipeline, TextExtractor};
pub use providers::{AnswerSynthesizer, EmbeddingProvider, ProviderSet, VectorStore};
pub use retrieval::QueryPipeline;
pub use storage::{MemoryVectorStore, SqliteVectorStore};
pub use types::{
    Answer, Chunk, Document, EmbeddedChunk, FileKind, QueryResponse, RetrievedContext,
    ScoredRecord, StoredRecord, UploadResponse, NO_ANSWER_TEXT,
};
