//! Retrieval and grounded answering

mod pipeline;

pub use pipeline::QueryPipeline;
