use std::sync::Arc;

use crate::config::RagConfig;
use crate::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::llm::{Answerer, DeterministicAnswerer, GeminiAnswerer};
use crate::rag::sqlite::SqliteEmbeddingStore;
use crate::rag::store::EmbeddingStore;
use crate::rag::RagService;

/// Global application state shared across all routes.
///
/// The store, embedding provider, and answerer are process-wide singletons
/// built once here, before the listener starts accepting requests; request
/// handlers only ever see them through shared references.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RagConfig>,
    pub store: Arc<dyn EmbeddingStore>,
    pub rag: RagService,
}

impl AppState {
    pub async fn initialize(config: Arc<RagConfig>) -> anyhow::Result<Arc<Self>> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store: Arc<dyn EmbeddingStore> =
            Arc::new(SqliteEmbeddingStore::new(config.db_path.clone()).await?);

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(&config));

        let answerer: Arc<dyn Answerer> = if config.gemini_api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY is not set; answers will use the retrieval fallback");
            Arc::new(DeterministicAnswerer)
        } else {
            Arc::new(GeminiAnswerer::new(
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            ))
        };

        let rag = RagService::new(config.clone(), store.clone(), embedder, answerer);

        Ok(Arc::new(Self { config, store, rag }))
    }
}
