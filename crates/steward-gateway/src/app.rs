use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use steward_audit::ActionLog;
use steward_core::StewardConfig;
use steward_google::{CalendarService, MailService};
use steward_memory::MemoryService;
use steward_scheduler::TaskService;

use crate::http::health::HealthProbe;

/// Dependencies reported by `/health`.
pub struct HealthProbes {
    pub database: Arc<dyn HealthProbe>,
    pub google: Arc<dyn HealthProbe>,
}

/// Shared by every handler as `Arc<AppState>`.
pub struct AppState {
    pub config: StewardConfig,
    pub tasks: Arc<TaskService>,
    pub memory: MemoryService,
    pub calendar: CalendarService,
    pub mail: MailService,
    pub audit: Arc<ActionLog>,
    pub probes: HealthProbes,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/v1/scheduler/remind",
            post(crate::http::scheduler::create_reminder),
        )
        .route(
            "/api/v1/scheduler/tasks/{id}",
            get(crate::http::scheduler::get_task).delete(crate::http::scheduler::delete_task),
        )
        .route(
            "/api/v1/calendar/upcoming",
            get(crate::http::google::upcoming_events),
        )
        .route(
            "/api/v1/calendar/create",
            post(crate::http::google::create_event),
        )
        .route("/api/v1/mail/search", get(crate::http::google::search_mail))
        .route(
            "/api/v1/memories",
            get(crate::http::memory::list_memories).post(crate::http::memory::save_memory),
        )
        .route(
            "/api/v1/memories/batch",
            post(crate::http::memory::save_memories),
        )
        .route(
            "/api/v1/memories/{id}",
            delete(crate::http::memory::delete_memory),
        )
        .route(
            "/api/v1/context/retrieve",
            post(crate::http::memory::retrieve_context),
        )
        .route("/api/v1/actions", get(crate::http::actions::list_actions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_api_key,
        ))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use rusqlite::Connection;
    use serde_json::{json, Value};
    use steward_core::config::{AuditConfig, GoogleConfig};
    use steward_google::GoogleClient;
    use steward_memory::{Embedder, MemoryError, MemoryStore};
    use steward_scheduler::SqliteTaskStore;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    struct Fixed(bool);

    #[async_trait]
    impl HealthProbe for Fixed {
        async fn check(&self) -> bool {
            self.0
        }
    }

    /// One axis per keyword, plus a small constant so no vector is zero.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> steward_memory::Result<Vec<f32>> {
            let hit = |w: &str| if text.contains(w) { 1.0 } else { 0.0 };
            Ok(vec![hit("coffee"), hit("dentist"), 0.01])
        }

        async fn embed_batch(&self, texts: &[String]) -> steward_memory::Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _: &str) -> steward_memory::Result<Vec<f32>> {
            Err(MemoryError::Embedding("OpenAI API error: overloaded".into()))
        }

        async fn embed_batch(&self, _: &[String]) -> steward_memory::Result<Vec<Vec<f32>>> {
            Err(MemoryError::Embedding("OpenAI API error: overloaded".into()))
        }
    }

    fn router_with(embedder: Arc<dyn Embedder>, google_up: bool) -> Router {
        router_full(embedder, google_up, GoogleConfig::default())
    }

    fn router_full(embedder: Arc<dyn Embedder>, google_up: bool, google: GoogleConfig) -> Router {
        let mut config = StewardConfig::default();
        config.gateway.api_key = Some(KEY.into());

        let audit = Arc::new(
            ActionLog::new(Connection::open_in_memory().unwrap(), AuditConfig::default()).unwrap(),
        );
        let store = Arc::new(SqliteTaskStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let memory_store =
            Arc::new(MemoryStore::new(Connection::open_in_memory().unwrap()).unwrap());

        let google = Arc::new(GoogleClient::new(google).unwrap());

        let state = Arc::new(AppState {
            config,
            tasks: Arc::new(TaskService::new(store, audit.clone())),
            memory: MemoryService::new(embedder, memory_store, audit.clone()),
            calendar: CalendarService::new(google.clone(), audit.clone()),
            mail: MailService::new(google, audit.clone()),
            audit,
            probes: HealthProbes {
                database: Arc::new(Fixed(true)),
                google: Arc::new(Fixed(google_up)),
            },
        });
        build_router(state)
    }

    fn router() -> Router {
        router_with(Arc::new(KeywordEmbedder), true)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {KEY}"));
        match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["database"], true);
    }

    #[tokio::test]
    async fn health_reports_unavailable_dependency() {
        let app = router_with(Arc::new(KeywordEmbedder), false);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["status"], "unhealthy");
        assert_eq!(body["data"]["google"], false);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_401() {
        let app = router();
        for auth in [None, Some("Basic dGVzdA=="), Some(KEY)] {
            let mut builder = Request::builder().uri("/api/v1/actions");
            if let Some(a) = auth {
                builder = builder.header(header::AUTHORIZATION, a);
            }
            let (status, body) = send(&app, builder.body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
            assert_eq!(body["error"]["retry"], false);
        }
    }

    #[tokio::test]
    async fn wrong_token_is_403() {
        let app = router();
        let req = Request::builder()
            .uri("/api/v1/actions")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn reminder_lifecycle_over_http() {
        let app = router();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/scheduler/remind",
                Some(json!({"message": "Call Bob", "deliver_at": "2030-05-01T09:00:00Z"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["task_type"], "REMINDER");
        assert_eq!(body["data"]["status"], "PENDING");
        assert_eq!(body["data"]["payload"]["message"], "Call Bob");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/scheduler/tasks/{id}");
        let (status, body) = send(&app, request(Method::GET, &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());

        let (status, body) = send(&app, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        let (status, body) = send(&app, request(Method::GET, &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (_, body) = send(
            &app,
            request(Method::GET, "/api/v1/actions?tool=scheduler_create_reminder", None),
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_reminder_is_400() {
        let app = router();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/scheduler/remind",
                Some(json!({"message": "", "deliver_at": "next tuesday"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["retry"], false);
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("Message is required"));
        assert!(message.contains("deliver_at must be a valid ISO datetime"));
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = router();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/scheduler/remind")
            .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn memories_round_trip() {
        let app = router();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/memories",
                Some(json!({"content": "likes coffee with oat milk", "category": "preference"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "saved");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/context/retrieve",
                Some(json!({"query": "order coffee"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let hits = body["data"].as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["category"], "preference");
    }

    #[tokio::test]
    async fn memory_validation_and_failures() {
        let app = router();
        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/memories", Some(json!({"category": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "content is required");

        let (status, _) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/context/retrieve",
                Some(json!({"query": "q", "top_k": 50})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let down = router_with(Arc::new(DownEmbedder), true);
        let (status, body) = send(
            &down,
            request(Method::POST, "/api/v1/memories", Some(json!({"content": "hello"}))),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "MEMORY_SAVE_ERROR");
        assert_eq!(body["error"]["retry"], true);

        let (status, body) = send(
            &down,
            request(Method::POST, "/api/v1/context/retrieve", Some(json!({"query": "hello"}))),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONTEXT_RETRIEVE_ERROR");
    }

    #[tokio::test]
    async fn actions_limit_is_applied() {
        let app = router();
        for i in 0..3 {
            send(
                &app,
                request(
                    Method::POST,
                    "/api/v1/memories",
                    Some(json!({ "content": format!("note {i}") })),
                ),
            )
            .await;
        }
        let (status, body) = send(&app, request(Method::GET, "/api/v1/actions?limit=2", None)).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["data"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["tool_name"], "memory_save");

        let (status, _) = send(&app, request(Method::GET, "/api/v1/actions?limit=abc", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    #[tokio::test]
    async fn memories_can_be_listed_batched_and_deleted() {
        let app = router();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/memories/batch",
                Some(json!({"memories": [
                    {"content": "likes coffee", "category": "preference"},
                    {"content": "dentist on Friday"}
                ]})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let saved = body["data"].as_array().unwrap();
        assert_eq!(saved.len(), 2);
        let first = saved[0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, request(Method::GET, "/api/v1/memories", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let uri = format!("/api/v1/memories/{first}");
        let (status, body) = send(&app, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        let (status, body) = send(&app, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = send(
            &app,
            request(Method::POST, "/api/v1/memories/batch", Some(json!({"memories": []}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn google_routes_without_credentials() {
        let app = router();
        for (method, uri, body) in [
            (Method::GET, "/api/v1/calendar/upcoming", None),
            (Method::GET, "/api/v1/mail/search?q=from:bob", None),
            (
                Method::POST,
                "/api/v1/calendar/create",
                Some(json!({"summary": "Lunch", "start": "2030-01-01T12:00:00Z", "duration_min": 60})),
            ),
        ] {
            let (status, body) = send(&app, request(method, uri, body)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(body["error"]["code"], "GOOGLE_NOT_CONFIGURED");
            assert_eq!(body["error"]["retry"], false);
        }

        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/calendar/create", Some(json!({"summary": "Lunch"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["message"],
            "Start must be a valid ISO datetime, duration_min must be between 1 and 1440"
        );

        let (status, _) = send(&app, request(Method::GET, "/api/v1/calendar/upcoming?hours=0", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Token endpoint plus just enough of Calendar and Gmail for the routes.
    async fn spawn_upstream() -> GoogleConfig {
        use axum::{extract::Path, Json};

        let upstream = Router::new()
            .route(
                "/token",
                post(|| async { Json(json!({"access_token": "at-1", "expires_in": 3600})) }),
            )
            .route(
                "/calendar/v3/calendars/primary/events",
                get(|| async {
                    Json(json!({"items": [{
                        "id": "evt-1",
                        "summary": "Standup",
                        "start": {"dateTime": "2030-01-01T09:00:00Z"},
                        "end": {"dateTime": "2030-01-01T09:15:00Z"}
                    }]}))
                })
                .post(|Json(mut event): Json<Value>| async move {
                    event["id"] = json!("evt-new");
                    Json(event)
                }),
            )
            .route(
                "/gmail/v1/users/me/messages",
                get(|| async { Json(json!({"messages": [{"id": "m1", "threadId": "t1"}]})) }),
            )
            .route(
                "/gmail/v1/users/me/messages/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({
                        "id": id,
                        "threadId": "t1",
                        "snippet": "Your invoice",
                        "payload": {"headers": [{"name": "Subject", "value": "Invoice"}]}
                    }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        GoogleConfig {
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            refresh_token: Some("rt".into()),
            token_url: format!("http://{addr}/token"),
            api_base_url: format!("http://{addr}"),
            timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn google_routes_against_upstream() {
        let app = router_full(Arc::new(KeywordEmbedder), true, spawn_upstream().await);

        let (status, body) = send(&app, request(Method::GET, "/api/v1/calendar/upcoming?hours=12", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["summary"], "Standup");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/calendar/create",
                Some(json!({"summary": "Lunch", "start": "2030-01-01T12:00:00Z", "duration_min": 90})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], "evt-new");
        assert_eq!(body["data"]["end"], "2030-01-01T13:30:00Z");

        let (status, body) = send(&app, request(Method::GET, "/api/v1/mail/search", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["subject"], "Invoice");
        assert_eq!(body["data"][0]["threadId"], "t1");

        let (_, body) = send(&app, request(Method::GET, "/api/v1/actions", None)).await;
        let tools: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["tool_name"].as_str().unwrap())
            .collect();
        assert_eq!(tools, vec!["gmail_search", "google_calendar_insert", "google_calendar_list"]);
        assert_eq!(body["data"][0]["input_params"]["query"], "is:unread label:important");
    }
}
