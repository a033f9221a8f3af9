use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use steward_core::StewardError;

use crate::app::AppState;
use crate::http::envelope::{respond, ApiError};

#[derive(Debug, Deserialize)]
pub struct ActionsQuery {
    /// Only entries written by this tool.
    pub tool: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/v1/actions — recent action log entries, newest first.
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ActionsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(|e| StewardError::Validation(e.body_text()))?;
    let entries = match q.tool.as_deref() {
        Some(tool) => state.audit.by_tool_name(tool, q.limit)?,
        None => state.audit.recent(q.limit)?,
    };
    Ok(respond(StatusCode::OK, entries))
}
