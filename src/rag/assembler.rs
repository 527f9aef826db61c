//! Context assembly and answer-section reconciliation.
//!
//! Turns ranked chunks into ordered context segments enriched with their
//! linked images and owning documents, and reconciles the answerer's
//! structured sections back against those segments.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::{EmbeddingStore, ImageRef, RankedChunk};
use crate::core::errors::ApiError;
use crate::llm::AnswerSection;

/// Document summary attached to a context segment. Carries the derived
/// retrieval URL, never the raw storage path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Option<i64>,
    pub filename: Option<String>,
    pub url: Option<String>,
}

/// One ranked context segment handed to the answerer and echoed in the
/// search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSegment {
    /// 1-based rank.
    pub order: usize,
    pub chunk_id: i64,
    pub document_id: i64,
    pub page_number: i64,
    pub chunk_index: i64,
    pub content: String,
    /// Copy of the stored chunk metadata with `similarity` injected; the
    /// stored record itself is never mutated.
    pub metadata: Value,
    pub images: Vec<ImageRef>,
    pub similarity: f32,
    pub document: DocumentSummary,
}

/// Document reference inside a reconciled section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDocument {
    pub id: Option<i64>,
    pub filename: Option<String>,
    pub url: Option<String>,
    pub page_number: i64,
}

/// A reconciled answer section: the answerer's title/text plus the images
/// and documents of every chunk it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: Option<String>,
    pub text: Option<String>,
    pub chunk_ids: Vec<i64>,
    pub images: Vec<ImageRef>,
    pub documents: Vec<SectionDocument>,
}

/// Segments plus the image grouping needed later for reconciliation.
pub struct AssembledContext {
    pub segments: Vec<ContextSegment>,
    pub images_by_chunk: HashMap<i64, Vec<ImageRef>>,
}

pub struct ContextAssembler {
    store: Arc<dyn EmbeddingStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn EmbeddingStore>) -> Self {
        Self { store }
    }

    /// Build ordered context segments for the ranked chunks.
    ///
    /// Images and documents are batch-fetched once, not per chunk. Storage
    /// failures here are hard failures for the search request.
    pub async fn assemble(&self, ranked: &[RankedChunk]) -> Result<AssembledContext, ApiError> {
        let chunk_ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        let document_ids: Vec<i64> = ranked.iter().map(|c| c.document_id).collect();

        let images_by_chunk = self.store.fetch_images_for_chunks(&chunk_ids).await?;
        let documents = self.store.fetch_documents_by_ids(&document_ids).await?;

        let segments = ranked
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let document = match documents.get(&chunk.document_id) {
                    Some(doc) => DocumentSummary {
                        id: Some(doc.id),
                        filename: Some(doc.filename.clone()),
                        url: Some(doc.file_url()),
                    },
                    None => DocumentSummary {
                        id: None,
                        filename: None,
                        url: None,
                    },
                };

                let mut metadata = chunk.metadata.clone();
                if let Value::Object(map) = &mut metadata {
                    map.insert("similarity".to_string(), serde_json::json!(chunk.similarity));
                }

                ContextSegment {
                    order: i + 1,
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    page_number: chunk.page_number,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    metadata,
                    images: images_by_chunk.get(&chunk.id).cloned().unwrap_or_default(),
                    similarity: chunk.similarity,
                    document,
                }
            })
            .collect();

        Ok(AssembledContext {
            segments,
            images_by_chunk,
        })
    }

    /// Reconcile the answerer's sections against the assembled context.
    ///
    /// Chunk ids that fail integer coercion are dropped without error. A
    /// section's images are the concatenation of the images of every
    /// referenced chunk, in chunk-id list order; its documents are the
    /// owning documents of every referencing segment, in segment order.
    /// Neither list is deduplicated.
    pub fn reconcile_sections(
        &self,
        sections: &[AnswerSection],
        segments: &[ContextSegment],
        images_by_chunk: &HashMap<i64, Vec<ImageRef>>,
    ) -> Vec<Section> {
        sections
            .iter()
            .map(|section| {
                let chunk_ids: Vec<i64> = section
                    .chunk_ids
                    .iter()
                    .filter_map(coerce_chunk_id)
                    .collect();

                let images: Vec<ImageRef> = chunk_ids
                    .iter()
                    .flat_map(|id| images_by_chunk.get(id).cloned().unwrap_or_default())
                    .collect();

                let documents: Vec<SectionDocument> = segments
                    .iter()
                    .filter(|seg| chunk_ids.contains(&seg.chunk_id))
                    .map(|seg| SectionDocument {
                        id: seg.document.id,
                        filename: seg.document.filename.clone(),
                        url: seg.document.url.clone(),
                        page_number: seg.page_number,
                    })
                    .collect();

                Section {
                    title: section.title.clone(),
                    text: section.text.clone(),
                    chunk_ids,
                    images,
                    documents,
                }
            })
            .collect()
    }
}

/// Coerce a JSON chunk id (number or numeric string) to i64.
fn coerce_chunk_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
