use rusqlite::{Connection, Result};

/// Initialise the `memories` table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id          TEXT NOT NULL PRIMARY KEY,
            content     TEXT NOT NULL,
            embedding   TEXT NOT NULL,   -- JSON array of f32
            category    TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memories_created
            ON memories(created_at);",
    )
}
