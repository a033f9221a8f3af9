use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use steward_core::{config::AuditConfig, time};
use tracing::{debug, warn};

use crate::{
    db::init_db,
    error::{AuditError, Result},
    types::ActionLogEntry,
};

/// Append-only audit sink backed by the `action_logs` table.
///
/// Writes are awaited by callers but never decide the outcome of the
/// operation they document; use [`ActionLog::record`] when a logging failure
/// should only be reported.
pub struct ActionLog {
    db: Mutex<Connection>,
    limits: AuditConfig,
}

impl ActionLog {
    pub fn new(conn: Connection, limits: AuditConfig) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            limits,
        })
    }

    /// Append an entry and return it as stored.
    pub fn log(
        &self,
        tool_name: &str,
        input_params: Option<&Value>,
        output_summary: Option<&str>,
        execution_time_ms: Option<i64>,
    ) -> Result<ActionLogEntry> {
        let now = Utc::now();
        let input_json = input_params.map(serde_json::to_string).transpose()?;

        let db = self.db.lock().expect("action log connection poisoned");
        db.execute(
            "INSERT INTO action_logs
             (tool_name, input_params, output_summary, execution_time_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                tool_name,
                input_json,
                output_summary,
                execution_time_ms,
                time::to_db(now)
            ],
        )?;
        let id = db.last_insert_rowid();
        debug!(id, tool_name, "action logged");

        Ok(ActionLogEntry {
            id,
            tool_name: tool_name.to_string(),
            input_params: input_params.cloned(),
            output_summary: output_summary.map(String::from),
            execution_time_ms,
            created_at: now,
        })
    }

    /// Like [`ActionLog::log`], but a failure is only reported via `tracing`.
    pub fn record(
        &self,
        tool_name: &str,
        input_params: Option<&Value>,
        output_summary: Option<&str>,
        execution_time_ms: Option<i64>,
    ) -> Option<ActionLogEntry> {
        match self.log(tool_name, input_params, output_summary, execution_time_ms) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(tool_name, error = %e, "failed to write action log entry");
                None
            }
        }
    }

    /// Most recent entries across all tools, newest first.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<ActionLogEntry>> {
        let limit = self.clamp(limit.unwrap_or(self.limits.default_recent_limit));
        let db = self.db.lock().expect("action log connection poisoned");
        let mut stmt = db.prepare(
            "SELECT id, tool_name, input_params, output_summary, execution_time_ms, created_at
             FROM action_logs
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], read_row)?;
        let entries = rows
            .map(|r| decode_row(r?))
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Most recent entries for one tool, newest first.
    pub fn by_tool_name(&self, tool_name: &str, limit: Option<usize>) -> Result<Vec<ActionLogEntry>> {
        let limit = self.clamp(limit.unwrap_or(self.limits.default_tool_limit));
        let db = self.db.lock().expect("action log connection poisoned");
        let mut stmt = db.prepare(
            "SELECT id, tool_name, input_params, output_summary, execution_time_ms, created_at
             FROM action_logs
             WHERE tool_name = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![tool_name, limit as i64], read_row)?;
        let entries = rows
            .map(|r| decode_row(r?))
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn clamp(&self, limit: usize) -> usize {
        limit.min(self.limits.max_limit)
    }
}

type RawRow = (i64, String, Option<String>, Option<String>, Option<i64>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<ActionLogEntry> {
    let (id, tool_name, input_json, output_summary, execution_time_ms, created_at) = raw;
    let input_params = input_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let created_at =
        time::from_db(&created_at).map_err(|e| AuditError::Timestamp(e.to_string()))?;
    Ok(ActionLogEntry {
        id,
        tool_name,
        input_params,
        output_summary,
        execution_time_ms,
        created_at,
    })
}
