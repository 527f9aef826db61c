//! Retrieval-augmented search over ingested documents.
//!
//! This module provides:
//! - `chunker`: overlapping text window splitting
//! - `store`: the `EmbeddingStore` trait and record types
//! - `sqlite`: the SQLite store implementation
//! - `ranker`: dual-path similarity ranking
//! - `assembler`: context segment assembly and section reconciliation
//! - `ingest`: the per-page ingestion pipeline
//! - `RagService`: the query-time pipeline gluing the above together

pub mod assembler;
pub mod chunker;
pub mod ingest;
pub mod ranker;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::core::errors::ApiError;
use crate::embedding::EmbeddingProvider;
use crate::llm::Answerer;
use assembler::{ContextAssembler, ContextSegment, Section};
use ingest::{DocumentSource, IngestStats};
use ranker::{Ranker, RankingPath};
use store::EmbeddingStore;

/// Full search response payload: the answer, its reconciled sections, the
/// ranked context, and retrieval bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub answer: String,
    pub sections: Vec<Section>,
    pub context: Vec<ContextSegment>,
    /// Chunk ids in rank order.
    pub chunks_used: Vec<i64>,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub ranking_path: RankingPath,
}

/// Query-time pipeline over process-wide singletons: embed the query, rank
/// stored chunks, assemble context, answer, reconcile.
#[derive(Clone)]
pub struct RagService {
    config: Arc<RagConfig>,
    store: Arc<dyn EmbeddingStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    answerer: Arc<dyn Answerer>,
}

impl RagService {
    pub fn new(
        config: Arc<RagConfig>,
        store: Arc<dyn EmbeddingStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn Answerer>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            answerer,
        }
    }

    pub fn store(&self) -> &Arc<dyn EmbeddingStore> {
        &self.store
    }

    /// Run the search pipeline for an already-validated query.
    ///
    /// `top_k` is clamped to `[1, max_context_chunks]`. Ranking and
    /// answering degrade internally; only storage failures surface.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome, ApiError> {
        let top_k = top_k.clamp(1, self.config.max_context_chunks);

        let query_embedding = self.embedder.embed_text(query).await?;

        let ranker = Ranker::new(
            self.store.clone(),
            self.config.use_vector_index,
            self.config.max_context_chunks,
        );
        let (ranked, ranking_path) = ranker.rank(&query_embedding, top_k).await;
        let chunks_used: Vec<i64> = ranked.iter().map(|c| c.id).collect();

        let assembler = ContextAssembler::new(self.store.clone());
        let assembled = assembler.assemble(&ranked).await?;

        let payload = self.answerer.generate(query, &assembled.segments).await;
        let sections = assembler.reconcile_sections(
            &payload.sections,
            &assembled.segments,
            &assembled.images_by_chunk,
        );

        Ok(SearchOutcome {
            answer: payload.answer,
            sections,
            context: assembled.segments,
            chunks_used,
            model: self.answerer.model_id(),
            embedding_model: self.config.text_embedding_model.clone(),
            embedding_dim: self.config.text_embedding_dim,
            ranking_path,
        })
    }

    /// Ingest a document from pre-extracted pages.
    pub async fn ingest(&self, source: DocumentSource) -> Result<IngestStats, ApiError> {
        ingest::ingest_document(&self.store, &self.embedder, &self.config, source).await
    }
}
