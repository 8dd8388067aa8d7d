//! HTTP routes

pub mod query;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(info))
        .route(
            "/upload",
            post(upload::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(query::query_documents))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Service info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let records = match state.store().len().await {
        Ok(count) => serde_json::json!(count),
        Err(e) => {
            tracing::warn!("Could not count records: {}", e);
            serde_json::Value::Null
        }
    };
    let config = state.config();

    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document ingestion and question answering with grounded answers",
        "endpoints": {
            "POST /upload": "Upload a PDF, Word or text document (multipart field with filename)",
            "POST /query": "Ask a question (form field `question`)",
            "GET /health": "Health check",
            "GET /info": "Service information"
        },
        "backend": config.backend,
        "store": state.store().name(),
        "records": records,
        "chunking": {
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap
        },
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "relevance_threshold": config.retrieval.relevance_threshold
        }
    }))
}
