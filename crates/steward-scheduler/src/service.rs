use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use steward_audit::ActionLog;
use tracing::info;

use crate::{
    error::{Result, SchedulerError},
    store::TaskStore,
    types::{CreateReminderRequest, ScheduledTask, TaskStatus, TaskType},
};

const CREATE_REMINDER_TOOL: &str = "scheduler_create_reminder";
/// Characters of the reminder message echoed into the audit summary.
const SUMMARY_PREVIEW_CHARS: usize = 50;

/// Typed operations over a [`TaskStore`].
///
/// `create_reminder` is the entry point for the HTTP surface; the `mark_*`
/// and `get_pending_tasks` pass-throughs are used by the task runner.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    audit: Arc<ActionLog>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, audit: Arc<ActionLog>) -> Self {
        Self { store, audit }
    }

    /// Validate `req`, persist a REMINDER task and record it in the action log.
    pub fn create_reminder(&self, req: &CreateReminderRequest) -> Result<ScheduledTask> {
        let started = Instant::now();
        let execute_at = validate_reminder(req)?;

        let payload = json!({
            "message": req.message,
            "context": req.context,
        });
        let task = self.store.create(TaskType::Reminder, payload, execute_at)?;

        let input = serde_json::to_value(req)?;
        let preview: String = req.message.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        self.audit.record(
            CREATE_REMINDER_TOOL,
            Some(&input),
            Some(&format!("Created reminder: {preview}...")),
            Some(started.elapsed().as_millis() as i64),
        );

        info!(task_id = %task.id, execute_at = %task.execute_at, "reminder scheduled");
        Ok(task)
    }

    /// Claim every task that is due now.
    pub fn get_pending_tasks(&self) -> Result<Vec<ScheduledTask>> {
        self.store.claim_due()
    }

    pub fn get_task(&self, id: &str) -> Result<ScheduledTask> {
        self.store
            .get_by_id(id)?
            .ok_or_else(|| SchedulerError::TaskNotFound { id: id.to_string() })
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        self.store.delete_by_id(id)
    }

    pub fn mark_processing(&self, id: &str) -> Result<()> {
        self.store.update_status(id, TaskStatus::Processing)
    }

    pub fn mark_completed(&self, id: &str) -> Result<()> {
        self.store.update_status(id, TaskStatus::Completed)
    }

    pub fn mark_failed(&self, id: &str) -> Result<()> {
        self.store.update_status(id, TaskStatus::Failed)
    }
}

fn validate_reminder(req: &CreateReminderRequest) -> Result<DateTime<Utc>> {
    let mut problems = Vec::new();
    if req.message.is_empty() {
        problems.push("Message is required".to_string());
    }
    let execute_at = match DateTime::parse_from_rfc3339(&req.deliver_at) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            problems.push("deliver_at must be a valid ISO datetime".to_string());
            None
        }
    };
    match execute_at {
        Some(at) if problems.is_empty() => Ok(at),
        _ => Err(SchedulerError::Validation(problems.join(", "))),
    }
}
