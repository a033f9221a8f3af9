use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde_json::json;
use steward_core::StewardError;
use steward_scheduler::CreateReminderRequest;

use crate::app::AppState;
use crate::http::envelope::{respond, ApiError};

/// POST /api/v1/scheduler/remind — schedule a REMINDER task.
pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateReminderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|e| StewardError::Validation(e.body_text()))?;
    let task = state.tasks.create_reminder(&req)?;
    Ok(respond(StatusCode::CREATED, task))
}

/// GET /api/v1/scheduler/tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let task = state.tasks.get_task(&id)?;
    Ok(respond(StatusCode::OK, task))
}

/// DELETE /api/v1/scheduler/tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.tasks.delete_task(&id)?;
    Ok(respond(StatusCode::OK, json!({ "id": id, "deleted": true })))
}
