use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use steward_core::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::{ScheduledTask, TaskStatus, TaskType},
};

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "id, task_type, payload, execute_at, status, created_at, updated_at";

/// Durable storage for scheduled tasks.
///
/// The store owns the authoritative copy of every task. `claim_due` is the
/// only synchronisation point between runners: each due task is handed to
/// exactly one caller, even across processes sharing the same database.
pub trait TaskStore: Send + Sync {
    /// Insert a new PENDING task.
    fn create(
        &self,
        task_type: TaskType,
        payload: Value,
        execute_at: DateTime<Utc>,
    ) -> Result<ScheduledTask>;

    /// Atomically move every due PENDING task to PROCESSING and return them,
    /// earliest `execute_at` first.
    fn claim_due(&self) -> Result<Vec<ScheduledTask>>;

    /// Set `status` and refresh `updated_at`. Re-applying the current status
    /// is accepted; any other edge outside the lifecycle is rejected.
    fn update_status(&self, id: &str, status: TaskStatus) -> Result<()>;

    fn get_by_id(&self, id: &str) -> Result<Option<ScheduledTask>>;

    fn delete_by_id(&self, id: &str) -> Result<()>;
}

/// [`TaskStore`] over a SQLite `scheduled_tasks` table.
pub struct SqliteTaskStore {
    db: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Claim everything due at `now`.
    ///
    /// Runs as a single conditional UPDATE inside an IMMEDIATE transaction:
    /// the write lock serialises concurrent claimers, and a row claimed by one
    /// of them no longer matches `status = 'PENDING'` for the next.
    pub fn claim_due_at(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        let now_str = time::to_db(now);
        let mut db = self.db.lock().expect("task store connection poisoned");
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = {
            let mut stmt = tx.prepare(&format!(
                "UPDATE scheduled_tasks
                 SET status = 'PROCESSING', updated_at = ?1
                 WHERE status = 'PENDING' AND execute_at <= ?1
                 RETURNING {SELECT_COLUMNS}"
            ))?;
            let rows = stmt.query_map([&now_str], read_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        // Undecodable rows go straight to FAILED in this transaction; the
        // rest of the claim is unaffected.
        let mut tasks = Vec::with_capacity(raw.len());
        for row in raw {
            let id = row.id.clone();
            match decode_row(row) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    error!(task_id = %id, error = %e, "claimed task is corrupt, marking failed");
                    tx.execute(
                        "UPDATE scheduled_tasks SET status = 'FAILED', updated_at = ?1
                         WHERE id = ?2",
                        rusqlite::params![now_str, id],
                    )?;
                }
            }
        }
        tx.commit()?;

        // RETURNING order is unspecified.
        tasks.sort_by(|a, b| a.execute_at.cmp(&b.execute_at).then_with(|| a.id.cmp(&b.id)));

        if !tasks.is_empty() {
            debug!(count = tasks.len(), "claimed due tasks");
        }
        Ok(tasks)
    }

    fn current_status(db: &Connection, id: &str) -> Result<Option<TaskStatus>> {
        let status: Option<String> = db
            .query_row(
                "SELECT status FROM scheduled_tasks WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        status
            .map(|s| {
                s.parse().map_err(|reason| SchedulerError::CorruptRow {
                    id: id.to_string(),
                    reason,
                })
            })
            .transpose()
    }
}

impl TaskStore for SqliteTaskStore {
    fn create(
        &self,
        task_type: TaskType,
        payload: Value,
        execute_at: DateTime<Utc>,
    ) -> Result<ScheduledTask> {
        let now = Utc::now();
        let now_str = time::to_db(now);
        let id = Uuid::new_v4().to_string();
        let payload_json = serde_json::to_string(&payload)?;

        let db = self.db.lock().expect("task store connection poisoned");
        db.execute(
            "INSERT INTO scheduled_tasks
             (id, task_type, payload, execute_at, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5, ?5)",
            rusqlite::params![
                id,
                task_type.as_str(),
                payload_json,
                time::to_db(execute_at),
                now_str
            ],
        )?;

        info!(task_id = %id, %task_type, execute_at = %execute_at, "task created");

        // Read back so the returned record matches the stored precision.
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM scheduled_tasks WHERE id = ?1"
        ))?;
        let raw = stmt.query_row([&id], read_row)?;
        decode_row(raw)
    }

    fn claim_due(&self) -> Result<Vec<ScheduledTask>> {
        self.claim_due_at(Utc::now())
    }

    fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let allowed = status
            .allowed_predecessors()
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let now_str = time::to_db(Utc::now());

        let db = self.db.lock().expect("task store connection poisoned");
        let n = db.execute(
            &format!(
                "UPDATE scheduled_tasks SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status IN ({allowed})"
            ),
            rusqlite::params![status.as_str(), now_str, id],
        )?;
        if n == 1 {
            debug!(task_id = %id, %status, "task status updated");
            return Ok(());
        }

        match Self::current_status(&db, id)? {
            None => Err(SchedulerError::TaskNotFound { id: id.to_string() }),
            Some(from) => {
                warn!(task_id = %id, %from, to = %status, "rejected status transition");
                Err(SchedulerError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: status,
                })
            }
        }
    }

    fn get_by_id(&self, id: &str) -> Result<Option<ScheduledTask>> {
        let db = self.db.lock().expect("task store connection poisoned");
        let raw = db
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM scheduled_tasks WHERE id = ?1"),
                [id],
                read_row,
            )
            .optional()?;
        raw.map(decode_row).transpose()
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        let db = self.db.lock().expect("task store connection poisoned");
        let n = db.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        info!(task_id = %id, "task deleted");
        Ok(())
    }
}

/// Columns in `SELECT_COLUMNS` order, undecoded.
struct RawTask {
    id: String,
    task_type: String,
    payload: String,
    execute_at: String,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTask> {
    Ok(RawTask {
        id: row.get(0)?,
        task_type: row.get(1)?,
        payload: row.get(2)?,
        execute_at: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn decode_row(raw: RawTask) -> Result<ScheduledTask> {
    let corrupt = |reason: String| SchedulerError::CorruptRow {
        id: raw.id.clone(),
        reason,
    };
    let ts = |s: &str| time::from_db(s).map_err(|e| corrupt(e.to_string()));

    // A malformed payload is the handler's problem, not the store's: the task
    // still has to reach a terminal state once claimed.
    let payload = serde_json::from_str(&raw.payload).unwrap_or_else(|e| {
        warn!(task_id = %raw.id, error = %e, "task payload is not valid JSON");
        Value::Null
    });

    Ok(ScheduledTask {
        task_type: TaskType::from(raw.task_type.clone()),
        payload,
        execute_at: ts(&raw.execute_at)?,
        status: raw.status.parse().map_err(&corrupt)?,
        created_at: ts(&raw.created_at)?,
        updated_at: ts(&raw.updated_at)?,
        id: raw.id,
    })
}
