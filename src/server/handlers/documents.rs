use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Document summary by id. The raw storage path is never serialized; the
/// payload carries the derived retrieval URL instead.
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .store
        .fetch_document(doc_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    Ok(Json(json!({
        "id": document.id,
        "filename": document.filename,
        "metadata": document.metadata,
        "url": document.file_url(),
    })))
}

/// Serve the original file behind `Document::file_url`.
///
/// The only consumer of `source_path`: the locator stays server-side and the
/// bytes are streamed back under the document's filename-derived media type.
pub async fn get_document_file(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<i64>,
) -> Result<([(header::HeaderName, &'static str); 1], Vec<u8>), ApiError> {
    let document = state
        .store
        .fetch_document(doc_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    if document.source_path.is_empty() {
        return Err(ApiError::NotFound(
            "Document has no stored file".to_string(),
        ));
    }

    let bytes = tokio::fs::read(&document.source_path)
        .await
        .map_err(|_| ApiError::NotFound("Document file not found".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&document.filename))],
        bytes,
    ))
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") | Some("md") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("report.pdf"), "application/pdf");
        assert_eq!(content_type_for("scan.PNG"), "image/png");
        assert_eq!(content_type_for("notes.md"), "text/plain; charset=utf-8");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
