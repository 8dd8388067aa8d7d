//! Document upload endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Document, UploadResponse};

/// POST /upload - ingest one multipart file
///
/// Always answers 200; failures are reported as `{"error": ...}`.
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Json<UploadResponse> {
    let start = Instant::now();

    let result = match multipart {
        Ok(multipart) => ingest_upload(&state, multipart).await,
        Err(rejection) => Err(Error::invalid(format!(
            "Expected a multipart/form-data upload: {}",
            rejection
        ))),
    };

    match result {
        Ok((filename, stored)) => {
            tracing::info!(
                "Processed '{}': {} records in {:?}",
                filename,
                stored,
                start.elapsed()
            );
            Json(UploadResponse::processed())
        }
        Err(e) => {
            tracing::error!("Upload failed ({}): {}", e.kind(), e);
            Json(UploadResponse::from(&e))
        }
    }
}

async fn ingest_upload(state: &AppState, mut multipart: Multipart) -> Result<(String, usize)> {
    let document = read_document(&mut multipart).await?;
    let filename = document.filename.clone();

    let metadata = BTreeMap::from([("filename".to_string(), filename.clone())]);
    let stored = state
        .ingestion()
        .ingest(document, &filename, &metadata)
        .await?;

    Ok((filename, stored))
}

/// First multipart field carrying a filename becomes the document
async fn read_document(multipart: &mut Multipart) -> Result<Document> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::invalid(format!("Failed to read file '{}': {}", filename, e)))?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        return Document::new(filename, data);
    }

    Err(Error::invalid("No file provided"))
}
