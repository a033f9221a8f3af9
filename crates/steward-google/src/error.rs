use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleError {
    /// Credentials are missing from `[google]`.
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Validation(String),

    /// The token endpoint refused the refresh token.
    #[error("Google token refresh failed: {0}")]
    Auth(String),

    /// A Calendar or Gmail call answered with a non-2xx status.
    #[error("Google API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GoogleError>;
