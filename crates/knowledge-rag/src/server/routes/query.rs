//! Question answering endpoint

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::Deserialize;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::QueryResponse;

/// Form body of `POST /query`
#[derive(Debug, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub question: String,
}

/// POST /query - answer a question from the stored documents
///
/// Accepts the question url-encoded or as a multipart field. Always answers
/// 200; failures are reported as `{"error": ...}`.
pub async fn query_documents(
    State(state): State<AppState>,
    request: Request,
) -> Json<QueryResponse> {
    let start = Instant::now();

    let result = match read_question(request).await {
        Ok(question) => {
            tracing::info!("Query: \"{}\"", question);
            let top_k = state.config().retrieval.top_k;
            state.query().answer(&question, top_k).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(answer) => {
            tracing::info!(
                "Query complete in {:?} (grounded: {}, top score: {:?})",
                start.elapsed(),
                answer.is_grounded(),
                answer.top_score()
            );
            Json(QueryResponse::from(answer))
        }
        Err(e) => {
            tracing::error!("Query failed ({}): {}", e.kind(), e);
            Json(QueryResponse::from(&e))
        }
    }
}

async fn read_question(request: Request) -> Result<String> {
    let multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !multipart {
        let Form(form) = Form::<QueryForm>::from_request(request, &())
            .await
            .map_err(|e| Error::invalid(format!("Invalid query form: {}", e)))?;
        return Ok(form.question);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| Error::invalid(format!("Invalid query form: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() == Some("question") {
            return field
                .text()
                .await
                .map_err(|e| Error::invalid(format!("Failed to read question: {}", e)));
        }
    }

    // A missing field is treated as a blank question
    Ok(String::new())
}
