use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use steward_core::config::SchedulerConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{ScheduledTask, TaskType};

/// Why a handler could not finish a task. Any variant fails the task.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The notification sink answered with a non-success status.
    #[error("delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),
}

/// Performs the side effect a task of one [`TaskType`] stands for.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError>;
}

/// Dispatch table from task type to handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers for every known task type.
    pub fn with_defaults(cfg: &SchedulerConfig) -> Result<Self, HandlerError> {
        let mut registry = Self::new();
        registry.register(TaskType::Reminder, Arc::new(ReminderHandler::from_config(cfg)?));
        registry.register(TaskType::DailySummary, Arc::new(DailySummaryHandler));
        registry.register(TaskType::FollowUp, Arc::new(FollowUpHandler));
        Ok(registry)
    }

    /// Install `handler` for `task_type`, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type, handler);
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Run the handler registered for the task's type.
    pub async fn dispatch(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        match self.get(&task.task_type) {
            Some(handler) => handler.handle(task).await,
            None => Err(HandlerError::UnknownTaskType(task.task_type.to_string())),
        }
    }
}

/// Delivers REMINDER tasks to the configured webhook.
///
/// Without a webhook URL the reminder is only written to the local log and
/// the task still succeeds.
pub struct ReminderHandler {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl ReminderHandler {
    pub fn new(client: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self, HandlerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.webhook_timeout_ms))
            .build()?;
        Ok(Self::new(client, cfg.webhook_url.clone()))
    }
}

#[async_trait]
impl TaskHandler for ReminderHandler {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let message = task
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerError::InvalidPayload("missing string field `message`".into()))?;
        let context = task.payload.get("context").and_then(|v| v.as_str());

        let Some(url) = &self.webhook_url else {
            info!(task_id = %task.id, %message, "reminder fired (no webhook configured)");
            return Ok(());
        };

        let body = json!({
            "type": TaskType::Reminder.as_str(),
            "message": message,
            "context": context,
            "timestamp": Utc::now().to_rfc3339(),
        });
        debug!(task_id = %task.id, %url, "delivering reminder");

        let resp = self.client.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(task_id = %task.id, status = status.as_u16(), "reminder webhook rejected");
            return Err(HandlerError::Delivery {
                status: status.as_u16(),
                body: text,
            });
        }
        info!(task_id = %task.id, "reminder delivered");
        Ok(())
    }
}

/// Placeholder for DAILY_SUMMARY tasks.
pub struct DailySummaryHandler;

#[async_trait]
impl TaskHandler for DailySummaryHandler {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        debug!(task_id = %task.id, "daily summary handler: nothing to do");
        Ok(())
    }
}

/// Placeholder for FOLLOW_UP tasks.
pub struct FollowUpHandler;

#[async_trait]
impl TaskHandler for FollowUpHandler {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        debug!(task_id = %task.id, "follow-up handler: nothing to do");
        Ok(())
    }
}
