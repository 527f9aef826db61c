//! EmbeddingStore trait — abstract interface over chunk/document persistence.
//!
//! The primary implementation is `SqliteEmbeddingStore` in the `sqlite`
//! module. Backends with a native nearest-neighbor index can additionally
//! implement `vector_search`; the ranker falls back to an exact full scan
//! when that capability is missing or failing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// Chunk kind discriminator. Text chunks carry content and a text embedding;
/// image chunks carry an encoded payload and an image embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Text,
    Image,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::Image => "image",
        }
    }
}

/// A stored document record.
///
/// `source_path` is an opaque storage locator and must never be serialized
/// into API payloads; responses carry a derived retrieval URL instead.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub source_path: String,
    pub content_hash: String,
    pub owner: String,
    pub metadata: Value,
}

impl Document {
    /// Retrieval URL derived from the document id.
    pub fn file_url(&self) -> String {
        format!("/api/documents/{}/file", self.id)
    }
}

/// Fields for a new document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub source_path: String,
    pub content_hash: String,
    pub owner: String,
    pub metadata: Value,
}

/// Fields for a new chunk row.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document_id: i64,
    pub kind: ChunkKind,
    pub page_number: i64,
    pub chunk_index: i64,
    pub content: Option<String>,
    pub text_embedding: Option<Vec<f32>>,
    pub image_embedding: Option<Vec<f32>>,
    pub image_base64: Option<String>,
    pub linked_chunk_id: Option<i64>,
    pub metadata: Value,
}

/// A text chunk as fetched for ranking.
///
/// `embedding` is `None` when the stored value could not be decoded; such
/// candidates are skipped during ranking, never treated as errors.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: i64,
    pub document_id: i64,
    pub page_number: i64,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Value,
}

/// An image chunk grouped under its linked text chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: i64,
    pub linked_chunk_id: i64,
    pub page_number: i64,
    pub chunk_index: i64,
    pub image_base64: String,
    pub metadata: Value,
}

/// A chunk annotated with its similarity to the query embedding.
///
/// Similarity is ordinal within a single ranking call: the index path and the
/// full-scan fallback do not share a numeric range.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub id: i64,
    pub document_id: i64,
    pub page_number: i64,
    pub chunk_index: i64,
    pub content: String,
    pub metadata: Value,
    pub similarity: f32,
}

/// Abstract trait over embedding storage backends.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Create a document record and return its id.
    async fn insert_document(&self, doc: NewDocument) -> Result<i64, ApiError>;

    /// Overwrite an existing document record in place. `NotFound` when no
    /// record has that id.
    async fn update_document(&self, document_id: i64, doc: NewDocument) -> Result<(), ApiError>;

    /// Delete every chunk belonging to a document, returning the number
    /// removed. Used when re-ingesting a replaced document.
    async fn delete_chunks_for_document(&self, document_id: i64) -> Result<u64, ApiError>;

    /// Insert a chunk row and return its id. No ordering guarantee is
    /// assumed about the returned identity.
    async fn insert_chunk(&self, chunk: NewChunk) -> Result<i64, ApiError>;

    /// Fetch text chunks ordered by recency (most recent first), restricted
    /// to rows with a non-null text embedding.
    async fn fetch_text_chunks(&self, limit: usize) -> Result<Vec<StoredChunk>, ApiError>;

    /// Return image chunks keyed by their linked text chunk id.
    async fn fetch_images_for_chunks(
        &self,
        chunk_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ImageRef>>, ApiError>;

    /// Batch-fetch documents by id.
    async fn fetch_documents_by_ids(
        &self,
        document_ids: &[i64],
    ) -> Result<HashMap<i64, Document>, ApiError>;

    /// Fetch a single document.
    async fn fetch_document(&self, document_id: i64) -> Result<Option<Document>, ApiError> {
        let docs = self.fetch_documents_by_ids(&[document_id]).await?;
        Ok(docs.into_values().next())
    }

    /// Whether this backend offers index-accelerated nearest-neighbor search.
    fn supports_vector_search(&self) -> bool {
        false
    }

    /// Index-accelerated top-k search, already ordered and
    /// similarity-annotated. Backends without an index return
    /// `ApiError::Unsupported`.
    async fn vector_search(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<RankedChunk>, ApiError> {
        Err(ApiError::Unsupported(
            "vector index not available on this backend".to_string(),
        ))
    }
}
