//! In-process stand-in for the Google token endpoint, Calendar v3 and Gmail v1.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Path, RawQuery},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use steward_core::config::GoogleConfig;

pub struct FakeGoogle {
    pub base_url: String,
    exchanges: Arc<AtomicUsize>,
}

impl FakeGoogle {
    pub fn token_exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

pub fn configured(base_url: &str, refresh_token: &str) -> GoogleConfig {
    GoogleConfig {
        client_id: Some("cid".into()),
        client_secret: Some("secret".into()),
        refresh_token: Some(refresh_token.into()),
        token_url: format!("{base_url}/token"),
        api_base_url: base_url.to_string(),
        timeout_ms: 5_000,
    }
}

fn authorised(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer at-1")
}

fn unauthorised() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": 401, "message": "Invalid Credentials"}})),
    )
}

pub async fn spawn_google() -> FakeGoogle {
    let exchanges = Arc::new(AtomicUsize::new(0));
    let counter = exchanges.clone();

    let app = Router::new()
        .route(
            "/token",
            post(move |body: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if body.contains("grant_type=refresh_token") && body.contains("refresh_token=rt-good") {
                        (
                            StatusCode::OK,
                            Json(json!({"access_token": "at-1", "expires_in": 3599, "token_type": "Bearer"})),
                        )
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "invalid_grant",
                                "error_description": "Token has been expired or revoked."
                            })),
                        )
                    }
                }
            }),
        )
        .route(
            "/calendar/v3/users/me/calendarList",
            get(|headers: HeaderMap| async move {
                if !authorised(&headers) {
                    return unauthorised();
                }
                (StatusCode::OK, Json(json!({"items": [{"id": "primary"}]})))
            }),
        )
        .route(
            "/calendar/v3/calendars/primary/events",
            get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                if !authorised(&headers) {
                    return unauthorised();
                }
                let query = query.unwrap_or_default();
                if !query.contains("singleEvents=true") || !query.contains("orderBy=startTime") {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": {"message": "orderBy requires singleEvents"}})),
                    );
                }
                (
                    StatusCode::OK,
                    Json(json!({"items": [
                        {
                            "id": "evt-1",
                            "summary": "Standup",
                            "start": {"dateTime": "2030-01-01T09:00:00Z"},
                            "end": {"dateTime": "2030-01-01T09:15:00Z"},
                            "location": "Room 4"
                        },
                        {
                            "id": "evt-2",
                            "start": {"date": "2030-01-02"},
                            "end": {"date": "2030-01-03"}
                        }
                    ]})),
                )
            })
            .post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if !authorised(&headers) {
                    return unauthorised();
                }
                if body["summary"] == "explode" {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": {"code": 500, "message": "Backend Error"}})),
                    );
                }
                let mut event = body.clone();
                event["id"] = json!("evt-new");
                (StatusCode::OK, Json(event))
            }),
        )
        .route(
            "/gmail/v1/users/me/messages",
            get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                if !authorised(&headers) {
                    return unauthorised();
                }
                if query.unwrap_or_default().contains("q=nothing") {
                    return (StatusCode::OK, Json(json!({"resultSizeEstimate": 0})));
                }
                (
                    StatusCode::OK,
                    Json(json!({"messages": [
                        {"id": "m1", "threadId": "t1"},
                        {"id": "m2", "threadId": "t2"}
                    ]})),
                )
            }),
        )
        .route(
            "/gmail/v1/users/me/messages/{id}",
            get(
                |headers: HeaderMap, Path(id): Path<String>, RawQuery(query): RawQuery| async move {
                    if !authorised(&headers) {
                        return unauthorised();
                    }
                    let query = query.unwrap_or_default();
                    if !query.contains("format=metadata") || !query.contains("metadataHeaders=Subject") {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": {"message": "expected metadata request"}})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": id,
                            "threadId": format!("t-{id}"),
                            "snippet": format!("snippet of {id}"),
                            "payload": {"headers": [
                                {"name": "From", "value": "Alice <alice@example.com>"},
                                {"name": "subject", "value": format!("About {id}")},
                                {"name": "Date", "value": "Tue, 1 Jan 2030 09:00:00 +0000"}
                            ]}
                        })),
                    )
                },
            ),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeGoogle {
        base_url: format!("http://{addr}"),
        exchanges,
    }
}
