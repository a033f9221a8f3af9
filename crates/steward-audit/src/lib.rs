//! `steward-audit` — append-only action log.
//!
//! Every component that performs an externally observable operation records
//! it here: tool name, input snapshot, outcome summary and duration. Rows are
//! never updated or deleted.

pub mod db;
pub mod error;
pub mod log;
pub mod types;

pub use error::{AuditError, Result};
pub use log::ActionLog;
pub use types::ActionLogEntry;
