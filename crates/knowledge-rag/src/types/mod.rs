//! Core types for ingestion and retrieval

pub mod document;
pub mod response;

pub use document::{
    Chunk, Document, EmbeddedChunk, FileKind, ScoredRecord, StoredRecord, SOURCE_ID_KEY,
    START_OFFSET_KEY,
};
pub use response::{Answer, QueryResponse, RetrievedContext, UploadResponse, NO_ANSWER_TEXT};
