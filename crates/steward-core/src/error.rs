use thiserror::Error;

/// Errors surfaced to API clients. Each variant maps to a stable error code
/// and a retry hint carried in the response envelope.
#[derive(Debug, Error)]
pub enum StewardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Scheduler(String),

    #[error("{0}")]
    MemorySave(String),

    #[error("{0}")]
    ContextRetrieve(String),

    #[error("{0}")]
    Audit(String),

    #[error("{0}")]
    GoogleNotConfigured(String),

    #[error("{0}")]
    Calendar(String),

    #[error("{0}")]
    CalendarCreate(String),

    #[error("{0}")]
    MailSearch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StewardError {
    /// Short error code string sent to clients in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            StewardError::Config(_) => "CONFIG_ERROR",
            StewardError::Unauthorized(_) => "UNAUTHORIZED",
            StewardError::Forbidden(_) => "FORBIDDEN",
            StewardError::Validation(_) => "VALIDATION_ERROR",
            StewardError::NotFound(_) => "NOT_FOUND",
            StewardError::Scheduler(_) => "SCHEDULER_ERROR",
            StewardError::MemorySave(_) => "MEMORY_SAVE_ERROR",
            StewardError::ContextRetrieve(_) => "CONTEXT_RETRIEVE_ERROR",
            StewardError::Audit(_) => "AUDIT_ERROR",
            StewardError::GoogleNotConfigured(_) => "GOOGLE_NOT_CONFIGURED",
            StewardError::Calendar(_) => "GOOGLE_CALENDAR_ERROR",
            StewardError::CalendarCreate(_) => "GOOGLE_CALENDAR_CREATE_ERROR",
            StewardError::MailSearch(_) => "GMAIL_SEARCH_ERROR",
            StewardError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether re-issuing the same request is expected to help.
    pub fn retry(&self) -> bool {
        !matches!(
            self,
            StewardError::Config(_)
                | StewardError::Unauthorized(_)
                | StewardError::Forbidden(_)
                | StewardError::Validation(_)
                | StewardError::NotFound(_)
                | StewardError::GoogleNotConfigured(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StewardError>;
