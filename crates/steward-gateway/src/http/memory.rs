use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use steward_core::StewardError;
use steward_memory::{NewMemory, DEFAULT_THRESHOLD, DEFAULT_TOP_K};

use crate::app::AppState;
use crate::http::envelope::{respond, ApiError};

const MAX_TOP_K: i64 = 20;
const MAX_THRESHOLD: f64 = 2.0;
const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SaveMemoryBody {
    #[serde(default)]
    pub content: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveMemoriesBody {
    #[serde(default)]
    pub memories: Vec<NewMemory>,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveContextBody {
    #[serde(default)]
    pub query: String,
    pub top_k: Option<i64>,
    pub threshold: Option<f64>,
}

/// POST /api/v1/memories — embed and store a memory.
pub async fn save_memory(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SaveMemoryBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| StewardError::Validation(e.body_text()))?;
    if body.content.is_empty() {
        return Err(StewardError::Validation("content is required".into()).into());
    }

    let saved = state
        .memory
        .save_memory(&body.content, body.category.as_deref())
        .await
        .map_err(|e| StewardError::MemorySave(e.to_string()))?;
    Ok(respond(StatusCode::CREATED, saved))
}

/// POST /api/v1/memories/batch — embed and store up to 100 memories at once.
pub async fn save_memories(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SaveMemoriesBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| StewardError::Validation(e.body_text()))?;
    if body.memories.is_empty() || body.memories.len() > MAX_BATCH {
        return Err(StewardError::Validation(format!(
            "memories must contain between 1 and {MAX_BATCH} items"
        ))
        .into());
    }
    if body.memories.iter().any(|m| m.content.is_empty()) {
        return Err(StewardError::Validation("content is required".into()).into());
    }

    let saved = state
        .memory
        .save_memories(&body.memories)
        .await
        .map_err(|e| StewardError::MemorySave(e.to_string()))?;
    Ok(respond(StatusCode::CREATED, saved))
}

/// GET /api/v1/memories
pub async fn list_memories(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let memories = state
        .memory
        .list_memories()
        .map_err(|e| StewardError::Internal(e.to_string()))?;
    Ok(respond(StatusCode::OK, memories))
}

/// DELETE /api/v1/memories/{id}
pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let deleted = state
        .memory
        .delete_memory(&id)
        .map_err(|e| StewardError::Internal(e.to_string()))?;
    if !deleted {
        return Err(StewardError::NotFound(format!("Memory not found: {id}")).into());
    }
    Ok(respond(StatusCode::OK, json!({ "id": id, "deleted": true })))
}

/// POST /api/v1/context/retrieve — memories relevant to a query.
pub async fn retrieve_context(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RetrieveContextBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| StewardError::Validation(e.body_text()))?;
    let (top_k, threshold) = validate_retrieve(&body)?;

    let hits = state
        .memory
        .retrieve_context(&body.query, top_k, threshold)
        .await
        .map_err(|e| StewardError::ContextRetrieve(e.to_string()))?;
    Ok(respond(StatusCode::OK, hits))
}

fn validate_retrieve(body: &RetrieveContextBody) -> Result<(usize, f64), StewardError> {
    let mut problems = Vec::new();
    if body.query.is_empty() {
        problems.push("query is required".to_string());
    }
    let top_k = body.top_k.unwrap_or(DEFAULT_TOP_K as i64);
    if !(1..=MAX_TOP_K).contains(&top_k) {
        problems.push(format!("top_k must be between 1 and {MAX_TOP_K}"));
    }
    let threshold = body.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if !(0.0..=MAX_THRESHOLD).contains(&threshold) {
        problems.push(format!("threshold must be between 0 and {MAX_THRESHOLD}"));
    }

    if problems.is_empty() {
        Ok((top_k as usize, threshold))
    } else {
        Err(StewardError::Validation(problems.join(", ")))
    }
}
