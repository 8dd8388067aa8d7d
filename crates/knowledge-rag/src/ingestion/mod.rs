//! Document ingestion: text extraction, chunking and the ingestion pipeline

pub mod chunker;
pub mod extractor;
mod pipeline;

pub use chunker::{split, Chunker};
pub use extractor::{Extract, PdfExtractor, PlainTextExtractor, TextExtractor, WordExtractor};
pub use pipeline::IngestionPipeline;
