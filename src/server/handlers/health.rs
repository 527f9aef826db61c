use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "embedding_model": state.config.text_embedding_model,
        "embedding_dim": state.config.text_embedding_dim,
        "vector_index": state.config.use_vector_index && state.store.supports_vector_search(),
    }))
}
