//! Similarity ranking over stored text chunks.
//!
//! Two paths: an index-accelerated search on backends that support it, and
//! an exact full-scan fallback over a bounded pool of recent chunks. The
//! ranker never fails — index errors are logged and routed to the fallback,
//! and unusable candidates are skipped silently.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::{EmbeddingStore, RankedChunk};

/// Which ranking path produced a result set.
///
/// Similarity values are not comparable across paths: the index path reports
/// `1 - cosine_distance` while the fallback reports raw cosine. Treat scores
/// as ordinal within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPath {
    Index,
    Fallback,
}

pub struct Ranker {
    store: Arc<dyn EmbeddingStore>,
    use_vector_index: bool,
    max_context_chunks: usize,
}

impl Ranker {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        use_vector_index: bool,
        max_context_chunks: usize,
    ) -> Self {
        Self {
            store,
            use_vector_index,
            max_context_chunks,
        }
    }

    /// Return up to `top_k` chunks ordered by descending similarity to the
    /// query embedding, along with the path that produced them.
    pub async fn rank(&self, query_embedding: &[f32], top_k: usize) -> (Vec<RankedChunk>, RankingPath) {
        if self.use_vector_index && self.store.supports_vector_search() {
            match self.store.vector_search(query_embedding, top_k).await {
                Ok(ranked) => return (ranked, RankingPath::Index),
                Err(err) => {
                    tracing::warn!("vector index search failed, falling back to full scan: {}", err);
                }
            }
        }

        (self.rank_full_scan(query_embedding, top_k).await, RankingPath::Fallback)
    }

    async fn rank_full_scan(&self, query_embedding: &[f32], top_k: usize) -> Vec<RankedChunk> {
        let pool_size = (top_k * 20).max(self.max_context_chunks * 5);
        let candidates = match self.store.fetch_text_chunks(pool_size).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!("candidate fetch failed, returning no results: {}", err);
                return Vec::new();
            }
        };

        let mut scored: Vec<RankedChunk> = candidates
            .into_iter()
            .filter_map(|chunk| {
                // Missing or differently-sized embeddings come from older
                // embedding models; skip them rather than erroring.
                let embedding = chunk.embedding.as_deref()?;
                if embedding.len() != query_embedding.len() {
                    return None;
                }
                let similarity = cosine_similarity(query_embedding, embedding);
                Some(RankedChunk {
                    id: chunk.id,
                    document_id: chunk.document_id,
                    page_number: chunk.page_number,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content,
                    metadata: chunk.metadata,
                    similarity,
                })
            })
            .collect();

        // Stable sort keeps fetch order for equal scores.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Defined as exactly 0.0 when either norm is zero, so zero vectors never
/// produce NaN or a division error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    ((dot / (norm_a * norm_b)).clamp(-1.0, 1.0)) as f32
}
