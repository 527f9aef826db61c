//! Document ingestion pipeline.
//!
//! Consumes pre-extracted pages (file decoding is the upload collaborator's
//! job), chunks the text, embeds each chunk and image, and inserts rows one
//! at a time. Inserts commit independently: a mid-document failure leaves
//! the already-committed chunks in place, and callers needing atomicity
//! delete and re-ingest.
//!
//! Text and image embeddings whose length does not match the configured
//! dimension are logged and skipped; ingestion continues and the skip count
//! is reported in the stats.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::chunker::chunk_text;
use super::store::{ChunkKind, EmbeddingStore, NewChunk, NewDocument};
use crate::config::RagConfig;
use crate::core::errors::ApiError;
use crate::embedding::EmbeddingProvider;

/// An image extracted from a page, as a base64 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub name: String,
    pub data_base64: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

/// One extracted page of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub number: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<PageImage>,
}

/// A document ready for ingestion: identity plus extracted pages.
///
/// When `replace_document_id` is set, ingestion updates that document record
/// in place and re-ingests its chunks instead of creating a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub filename: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub replace_document_id: Option<i64>,
    pub pages: Vec<DocumentPage>,
}

fn default_metadata() -> serde_json::Value {
    json!({})
}

/// Ingestion outcome reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub document_id: i64,
    pub text_chunks: usize,
    pub image_chunks: usize,
    /// Chunks dropped for embedding-dimension mismatches.
    pub chunks_skipped: usize,
}

/// Content digest over the extracted pages, used when the caller did not
/// supply a hash of the original file bytes.
pub fn source_digest(source: &DocumentSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.filename.as_bytes());
    for page in &source.pages {
        hasher.update(page.number.to_le_bytes());
        hasher.update(page.text.as_bytes());
        for image in &page.images {
            hasher.update(image.data_base64.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Ingest a document: create (or, on replace, update) its record, then
/// chunk, embed, and store every page. Storage errors abort and surface;
/// embedding-dimension mismatches skip the affected chunk only.
pub async fn ingest_document(
    store: &Arc<dyn EmbeddingStore>,
    embedder: &Arc<dyn EmbeddingProvider>,
    config: &RagConfig,
    source: DocumentSource,
) -> Result<IngestStats, ApiError> {
    let content_hash = if source.content_hash.is_empty() {
        source_digest(&source)
    } else {
        source.content_hash.clone()
    };

    let mut metadata = source.metadata.clone();
    if let serde_json::Value::Object(map) = &mut metadata {
        map.insert(
            "ingested_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        map.insert("page_count".to_string(), json!(source.pages.len()));
        if source.replace_document_id.is_some() {
            map.insert("source".to_string(), json!("replace"));
        }
    }

    let record = NewDocument {
        filename: source.filename.clone(),
        source_path: source.source_path.clone(),
        content_hash,
        owner: source.owner.clone(),
        metadata,
    };

    let document_id = match source.replace_document_id {
        Some(existing_id) => {
            store.update_document(existing_id, record).await?;
            let removed = store.delete_chunks_for_document(existing_id).await?;
            tracing::info!(
                "replacing document {existing_id} ({}): {removed} prior chunks removed",
                source.filename
            );
            existing_id
        }
        None => store.insert_document(record).await?,
    };

    let mut stats = IngestStats {
        document_id,
        text_chunks: 0,
        image_chunks: 0,
        chunks_skipped: 0,
    };

    for page in &source.pages {
        tracing::debug!("processing page {} of {}", page.number, source.filename);
        let mut last_text_chunk_id: Option<i64> = None;

        let page_chunks = chunk_text(&page.text, config.chunk_size, config.chunk_overlap);
        for (idx, chunk) in page_chunks.iter().enumerate() {
            let chunk_index = (idx + 1) as i64;

            let embedding = match embedder.embed_text(chunk).await {
                Ok(e) => e,
                Err(err) => {
                    return Err(ApiError::Internal(format!(
                        "text embedding failed on page {}: {err}",
                        page.number
                    )))
                }
            };
            if embedding.len() != embedder.text_dim() {
                tracing::warn!(
                    "text embedding dimension mismatch on page {} chunk {}: expected {}, got {}; skipping",
                    page.number,
                    chunk_index,
                    embedder.text_dim(),
                    embedding.len()
                );
                stats.chunks_skipped += 1;
                continue;
            }

            let chunk_id = store
                .insert_chunk(NewChunk {
                    document_id,
                    kind: ChunkKind::Text,
                    page_number: page.number,
                    chunk_index,
                    content: Some(chunk.clone()),
                    text_embedding: Some(embedding),
                    image_embedding: None,
                    image_base64: None,
                    linked_chunk_id: None,
                    metadata: json!({
                        "type": "text",
                        "page": page.number,
                        "chunk": chunk_index,
                        "filename": source.filename,
                        "embedding_dim": embedder.text_dim(),
                        "model": embedder.text_model_id(),
                    }),
                })
                .await?;

            last_text_chunk_id = Some(chunk_id);
            stats.text_chunks += 1;
        }

        for (idx, image) in page.images.iter().enumerate() {
            let chunk_index = (idx + 1) as i64;

            if image.data_base64.is_empty() {
                tracing::warn!("empty image payload for {} on page {}", image.name, page.number);
                continue;
            }

            let embedding = match embedder.embed_image(&image.data_base64).await {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(
                        "image embedding failed for {} on page {}: {}",
                        image.name,
                        page.number,
                        err
                    );
                    continue;
                }
            };
            if embedding.len() != embedder.image_dim() {
                tracing::warn!(
                    "image embedding dimension mismatch for {} on page {}: expected {}, got {}; skipping",
                    image.name,
                    page.number,
                    embedder.image_dim(),
                    embedding.len()
                );
                stats.chunks_skipped += 1;
                continue;
            }

            store
                .insert_chunk(NewChunk {
                    document_id,
                    kind: ChunkKind::Image,
                    page_number: page.number,
                    chunk_index,
                    content: None,
                    text_embedding: None,
                    image_embedding: Some(embedding),
                    image_base64: Some(image.data_base64.clone()),
                    // Link to the nearest preceding text chunk on this page
                    // for co-presentation. Back-reference only.
                    linked_chunk_id: last_text_chunk_id,
                    metadata: json!({
                        "type": "image",
                        "page": page.number,
                        "source": image.name,
                        "image_width": image.width,
                        "image_height": image.height,
                        "embedding_dim": embedder.image_dim(),
                        "model": embedder.image_model_id(),
                    }),
                })
                .await?;

            stats.image_chunks += 1;
        }
    }

    tracing::info!(
        "ingested {}: {} text chunks, {} image chunks, {} skipped",
        source.filename,
        stats.text_chunks,
        stats.image_chunks,
        stats.chunks_skipped
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> DocumentSource {
        DocumentSource {
            filename: "report.pdf".to_string(),
            source_path: "/uploads/report.pdf".to_string(),
            content_hash: String::new(),
            owner: "tester".to_string(),
            metadata: json!({ "source": "pdf_upload" }),
            replace_document_id: None,
            pages: vec![DocumentPage {
                number: 1,
                text: "alpha beta gamma".to_string(),
                images: vec![PageImage {
                    name: "fig1.png".to_string(),
                    data_base64: "aW1n".to_string(),
                    width: Some(64),
                    height: Some(64),
                }],
            }],
        }
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let source = sample_source();
        assert_eq!(source_digest(&source), source_digest(&source));

        let mut altered = source.clone();
        altered.pages[0].text.push_str(" delta");
        assert_ne!(source_digest(&source), source_digest(&altered));
    }
}
