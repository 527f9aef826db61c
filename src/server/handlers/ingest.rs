use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::ingest::DocumentSource;
use crate::state::AppState;

/// Ingest a document from pre-extracted pages.
///
/// Upload handling and PDF decoding live with the caller; this endpoint
/// takes the extracted page text and image payloads directly.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(source): Json<DocumentSource>,
) -> Result<impl IntoResponse, ApiError> {
    if source.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename cannot be empty".to_string()));
    }
    if source.pages.is_empty() {
        return Err(ApiError::BadRequest(
            "document has no pages to ingest".to_string(),
        ));
    }

    let filename = source.filename.clone();
    let stats = state.rag.ingest(source).await?;

    Ok(Json(json!({
        "message": format!("{filename} processed successfully!"),
        "filename": filename,
        "document_id": stats.document_id,
        "chunks_stored": stats.text_chunks,
        "images_stored": stats.image_chunks,
        "chunks_skipped": stats.chunks_skipped,
    })))
}
