//! `steward-core` — configuration and the API-facing error taxonomy shared by
//! every other crate in the workspace.

pub mod config;
pub mod error;
pub mod time;

pub use config::StewardConfig;
pub use error::{Result, StewardError};
