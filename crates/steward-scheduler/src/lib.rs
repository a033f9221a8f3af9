//! `steward-scheduler` — durable polling task scheduler on SQLite.
//!
//! # Overview
//!
//! Tasks live in the `scheduled_tasks` table. The [`runner::TaskRunner`]
//! wakes every poll interval, atomically claims every PENDING task whose
//! `execute_at` has passed, and drives each one through its handler to a
//! terminal state:
//!
//! ```text
//! PENDING -> PROCESSING -> COMPLETED | FAILED
//! ```
//!
//! The claim is a conditional UPDATE, so several runners (threads or whole
//! processes) can share one database without executing a task twice.
//!
//! # Task types
//!
//! | Type            | Handler                                         |
//! |-----------------|-------------------------------------------------|
//! | `REMINDER`      | POSTs the message to the configured webhook     |
//! | `DAILY_SUMMARY` | placeholder, always succeeds                    |
//! | `FOLLOW_UP`     | placeholder, always succeeds                    |
//! | anything else   | marked FAILED ("unknown task type")             |
//!
//! A task left in PROCESSING by a crash is not re-queued.

pub mod db;
pub mod error;
pub mod handlers;
pub mod runner;
pub mod service;
pub mod store;
pub mod types;

pub use error::{Result, SchedulerError};
pub use handlers::{HandlerError, HandlerRegistry, TaskHandler};
pub use runner::{CycleReport, RunnerHandle, TaskRunner};
pub use service::TaskService;
pub use store::{SqliteTaskStore, TaskStore};
pub use types::{CreateReminderRequest, ScheduledTask, TaskStatus, TaskType};
