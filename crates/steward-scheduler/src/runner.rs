use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use steward_audit::ActionLog;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
    error::Result,
    handlers::{HandlerError, HandlerRegistry},
    service::TaskService,
    types::ScheduledTask,
};

const EXECUTE_TOOL: &str = "task_runner_execute";

/// Outcome counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Polling worker: claims due tasks and drives each to a terminal state.
pub struct TaskRunner {
    service: Arc<TaskService>,
    handlers: HandlerRegistry,
    audit: Arc<ActionLog>,
    poll_interval: Duration,
}

impl TaskRunner {
    pub fn new(
        service: Arc<TaskService>,
        handlers: HandlerRegistry,
        audit: Arc<ActionLog>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service,
            handlers,
            audit,
            poll_interval,
        }
    }

    /// Claim everything due and execute it sequentially, earliest first.
    ///
    /// Only a failed claim aborts the cycle; per-task failures are recorded
    /// on the task and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let tasks = self.service.get_pending_tasks()?;
        let mut report = CycleReport {
            claimed: tasks.len(),
            ..CycleReport::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }

        info!(count = tasks.len(), "processing due tasks");
        for task in &tasks {
            if self.execute(task).await {
                report.completed += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Spawn the poll loop: one cycle immediately, then one cycle per
    /// `poll_interval` measured from the end of the previous cycle.
    ///
    /// Dropping the returned handle also stops the loop after its current
    /// cycle.
    pub fn start(self) -> RunnerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(stop_rx));
        RunnerHandle { stop_tx, join }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "task runner started");
        loop {
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "poll cycle aborted");
            }
            if *stop_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                // only `true` is ever sent; a dropped handle also ends the loop
                _ = stop_rx.changed() => break,
            }
        }
        info!("task runner stopped");
    }

    /// Execute one claimed task. Returns `true` when it reached COMPLETED.
    async fn execute(&self, task: &ScheduledTask) -> bool {
        let started = Instant::now();
        let outcome = self.try_execute(task).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;
        let input = json!({
            "task_id": task.id,
            "task_type": task.task_type.as_str(),
        });

        match outcome {
            Ok(()) => {
                info!(task_id = %task.id, task_type = %task.task_type, elapsed_ms, "task completed");
                self.audit.record(
                    EXECUTE_TOOL,
                    Some(&input),
                    Some("Task completed successfully"),
                    Some(elapsed_ms),
                );
                true
            }
            Err(message) => {
                if let Err(e) = self.service.mark_failed(&task.id) {
                    error!(task_id = %task.id, error = %e, "could not mark task failed");
                }
                self.audit.record(
                    EXECUTE_TOOL,
                    Some(&input),
                    Some(&format!("Task failed: {message}")),
                    Some(elapsed_ms),
                );
                false
            }
        }
    }

    async fn try_execute(&self, task: &ScheduledTask) -> std::result::Result<(), String> {
        self.service
            .mark_processing(&task.id)
            .map_err(|e| e.to_string())?;

        match self.handlers.dispatch(task).await {
            Ok(()) => {}
            Err(e @ HandlerError::UnknownTaskType(_)) => {
                warn!(task_id = %task.id, task_type = %task.task_type, "no handler for task type");
                return Err(e.to_string());
            }
            Err(e) => {
                warn!(task_id = %task.id, task_type = %task.task_type, error = %e, "task handler failed");
                return Err(e.to_string());
            }
        }

        self.service
            .mark_completed(&task.id)
            .map_err(|e| e.to_string())
    }
}

/// Control handle for a running [`TaskRunner`] loop.
pub struct RunnerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RunnerHandle {
    /// Prevent further cycles. A cycle already in progress runs to the end.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!(error = %e, "task runner panicked");
        }
    }

    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
