use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
}

/// Run a retrieval-augmented search.
///
/// Validation failures are rejected before any retrieval work; downstream
/// ranking and answering degrade internally instead of failing the request.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let top_k = request.top_k.unwrap_or(state.config.default_top_k as i64);
    if !(1..=50).contains(&top_k) {
        return Err(ApiError::BadRequest(
            "top_k must be between 1 and 50".to_string(),
        ));
    }

    let outcome = state.rag.search(&query, top_k as usize).await?;

    let mut payload = serde_json::to_value(&outcome).map_err(ApiError::internal)?;
    if let Some(map) = payload.as_object_mut() {
        map.insert("query".to_string(), json!(query));
        map.insert("top_k".to_string(), json!(top_k));
    }
    Ok(Json(payload))
}
