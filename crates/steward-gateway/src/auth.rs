use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use steward_core::StewardError;
use tracing::debug;

use crate::app::AppState;
use crate::http::envelope::ApiError;

/// Paths reachable without a bearer token.
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Require `Authorization: Bearer <gateway.api_key>` on every other path.
///
/// A missing or non-Bearer header is 401; a token that does not match the
/// configured key (or any token when no key is configured) is 403.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ApiError(StewardError::Unauthorized(
            "Missing or invalid Authorization header".into(),
        ))
        .into_response();
    };

    let authorised = state
        .config
        .gateway
        .api_key
        .as_deref()
        .is_some_and(|expected| constant_time_eq(token, expected));
    if !authorised {
        debug!(path = %req.uri().path(), "rejected request with wrong API key");
        return ApiError(StewardError::Forbidden("Invalid API key".into())).into_response();
    }

    next.run(req).await
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
