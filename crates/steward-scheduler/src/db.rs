use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `scheduled_tasks` table (idempotent) and a composite index so
/// the claim query only touches due PENDING rows.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_tasks (
            id          TEXT    NOT NULL PRIMARY KEY,
            task_type   TEXT    NOT NULL,
            payload     TEXT    NOT NULL,   -- opaque JSON, never inspected here
            execute_at  TEXT    NOT NULL,   -- canonical UTC timestamp
            status      TEXT    NOT NULL DEFAULT 'PENDING'
                        CHECK (status IN ('PENDING', 'PROCESSING', 'COMPLETED', 'FAILED')),
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        -- Claim query: WHERE status = 'PENDING' AND execute_at <= ?
        CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_due
            ON scheduled_tasks (status, execute_at);
        ",
    )?;
    Ok(())
}
