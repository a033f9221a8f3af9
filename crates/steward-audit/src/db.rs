use rusqlite::Connection;

use crate::error::Result;

/// Initialise the action log schema. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS action_logs (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            tool_name         TEXT    NOT NULL,
            input_params      TEXT,             -- JSON object or NULL
            output_summary    TEXT,
            execution_time_ms INTEGER,
            created_at        TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_action_logs_tool
            ON action_logs (tool_name, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_action_logs_created
            ON action_logs (created_at DESC);
        ",
    )?;
    Ok(())
}
