use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use steward_core::StewardError;
use steward_google::{CreateEventRequest, GoogleError, DEFAULT_MAIL_QUERY, DEFAULT_UPCOMING_HOURS};

use crate::app::AppState;
use crate::http::envelope::{respond, ApiError};

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MailQuery {
    pub q: Option<String>,
}

/// Missing credentials and bad input keep their own codes; anything else is
/// reported under the operation's error code.
fn google_error(e: GoogleError, operation: fn(String) -> StewardError) -> ApiError {
    ApiError(match e {
        GoogleError::NotConfigured(msg) => StewardError::GoogleNotConfigured(msg),
        GoogleError::Validation(msg) => StewardError::Validation(msg),
        e => operation(e.to_string()),
    })
}

/// GET /api/v1/calendar/upcoming?hours=N — events in the next N hours (default 24).
pub async fn upcoming_events(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UpcomingQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(|e| StewardError::Validation(e.body_text()))?;
    let hours = q.hours.unwrap_or(DEFAULT_UPCOMING_HOURS);
    if hours < 1 {
        return Err(StewardError::Validation("hours must be a positive integer".into()).into());
    }

    let events = state
        .calendar
        .upcoming_events(hours)
        .await
        .map_err(|e| google_error(e, StewardError::Calendar))?;
    Ok(respond(StatusCode::OK, events))
}

/// POST /api/v1/calendar/create
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|e| StewardError::Validation(e.body_text()))?;
    let event = state
        .calendar
        .create_event(&req)
        .await
        .map_err(|e| google_error(e, StewardError::CalendarCreate))?;
    Ok(respond(StatusCode::CREATED, event))
}

/// GET /api/v1/mail/search?q=… — Gmail search, important unread mail by default.
pub async fn search_mail(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MailQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(|e| StewardError::Validation(e.body_text()))?;
    let query = q
        .q
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_MAIL_QUERY.to_string());

    let mail = state
        .mail
        .search(&query)
        .await
        .map_err(|e| google_error(e, StewardError::MailSearch))?;
    Ok(respond(StatusCode::OK, mail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_keep_their_codes() {
        let err = google_error(
            GoogleError::NotConfigured("Gmail is not configured.".into()),
            StewardError::MailSearch,
        );
        assert_eq!(err.0.code(), "GOOGLE_NOT_CONFIGURED");
        assert!(!err.0.retry());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = google_error(GoogleError::Validation("Summary is required".into()), StewardError::CalendarCreate);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = google_error(
            GoogleError::Api {
                status: 503,
                message: "Backend Error".into(),
            },
            StewardError::Calendar,
        );
        assert_eq!(err.0.code(), "GOOGLE_CALENDAR_ERROR");
        assert!(err.0.retry());
    }
}
