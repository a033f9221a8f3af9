use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of deferred work a task represents.
///
/// Stored as an upper-snake string. Strings written by newer code (or by
/// hand) that this build does not know survive as [`TaskType::Unknown`] so the
/// runner can still drive them to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskType {
    Reminder,
    DailySummary,
    FollowUp,
    Unknown(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::Reminder => "REMINDER",
            TaskType::DailySummary => "DAILY_SUMMARY",
            TaskType::FollowUp => "FOLLOW_UP",
            TaskType::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "REMINDER" => TaskType::Reminder,
            "DAILY_SUMMARY" => TaskType::DailySummary,
            "FOLLOW_UP" => TaskType::FollowUp,
            _ => TaskType::Unknown(s),
        }
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.as_str().to_string()
    }
}

/// Lifecycle state of a task: PENDING -> PROCESSING -> COMPLETED | FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for `execute_at`.
    Pending,
    /// Claimed by exactly one runner.
    Processing,
    /// Handler succeeded. Terminal.
    Completed,
    /// Handler failed or the task type is unknown. Terminal.
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// States a task may be in immediately before entering `self`.
    ///
    /// Includes `self`, so re-applying the current status is accepted.
    pub fn allowed_predecessors(self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Pending => &[TaskStatus::Pending],
            TaskStatus::Processing => &[TaskStatus::Pending, TaskStatus::Processing],
            TaskStatus::Completed => &[TaskStatus::Processing, TaskStatus::Completed],
            TaskStatus::Failed => &[TaskStatus::Processing, TaskStatus::Failed],
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        next.allowed_predecessors().contains(&self)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A persisted unit of deferred work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// UUID v4 string — primary key.
    pub id: String,
    pub task_type: TaskType,
    /// Handler-specific JSON object; the store never looks inside.
    pub payload: Value,
    /// The task becomes claimable once this instant has passed.
    pub execute_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::service::TaskService::create_reminder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminderRequest {
    pub message: String,
    /// RFC 3339 instant at which the reminder should fire.
    pub deliver_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}
