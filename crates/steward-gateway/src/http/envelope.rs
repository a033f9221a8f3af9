use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use steward_audit::AuditError;
use steward_core::StewardError;
use steward_scheduler::SchedulerError;
use tracing::error;

/// Body of every API response: `{success, data}` or `{success, error}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retry: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// `data` wrapped in a success envelope with the given status.
pub fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiResponse::ok(data))).into_response()
}

/// Handler error: a [`StewardError`] rendered as the error envelope.
#[derive(Debug)]
pub struct ApiError(pub StewardError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            StewardError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StewardError::Forbidden(_) => StatusCode::FORBIDDEN,
            StewardError::Validation(_) => StatusCode::BAD_REQUEST,
            StewardError::NotFound(_) => StatusCode::NOT_FOUND,
            StewardError::Config(_)
            | StewardError::Scheduler(_)
            | StewardError::MemorySave(_)
            | StewardError::ContextRetrieve(_)
            | StewardError::Audit(_)
            | StewardError::GoogleNotConfigured(_)
            | StewardError::Calendar(_)
            | StewardError::CalendarCreate(_)
            | StewardError::MailSearch(_)
            | StewardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.0.code(),
                message: self.0.to_string(),
                retry: self.0.retry(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StewardError> for ApiError {
    fn from(e: StewardError) -> Self {
        Self(e)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        Self(match e {
            SchedulerError::Validation(msg) => StewardError::Validation(msg),
            e @ SchedulerError::TaskNotFound { .. } => StewardError::NotFound(e.to_string()),
            e => StewardError::Scheduler(e.to_string()),
        })
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        Self(StewardError::Audit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn store_failure_is_retryable_scheduler_error() {
        let err = ApiError::from(SchedulerError::Database(rusqlite::Error::InvalidQuery));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "SCHEDULER_ERROR");
        assert_eq!(body["error"]["retry"], true);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn scheduler_validation_maps_to_400() {
        let err = ApiError::from(SchedulerError::Validation("Message is required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "Message is required");
        assert_eq!(body["error"]["retry"], false);
    }

    #[test]
    fn missing_task_maps_to_404() {
        let err = ApiError::from(SchedulerError::TaskNotFound { id: "t-9".into() });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.0.to_string(), "Task not found: t-9");
    }

    #[tokio::test]
    async fn success_envelope_omits_error() {
        let body = body_json(respond(StatusCode::CREATED, serde_json::json!({"id": "x"}))).await;
        assert_eq!(body, serde_json::json!({"success": true, "data": {"id": "x"}}));
    }
}
