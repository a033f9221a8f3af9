use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Sequential id assigned by the store.
    pub id: i64,
    /// Operation that was performed, e.g. `task_runner_execute`.
    pub tool_name: String,
    /// Snapshot of the operation's input, if any.
    pub input_params: Option<Value>,
    /// Human-readable outcome.
    pub output_summary: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}
