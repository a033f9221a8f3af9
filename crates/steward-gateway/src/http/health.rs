use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use steward_google::GoogleClient;
use tracing::warn;

use crate::app::AppState;
use crate::http::envelope::ApiResponse;

/// A dependency the health endpoint reports on.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Runs `SELECT 1` on its own connection.
pub struct DatabaseProbe {
    conn: Mutex<Connection>,
}

impl DatabaseProbe {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl HealthProbe for DatabaseProbe {
    async fn check(&self) -> bool {
        let db = self.conn.lock().expect("health probe connection poisoned");
        match db.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
            Ok(1) => true,
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "database health check failed");
                false
            }
        }
    }
}

/// Lists one calendar through the shared [`GoogleClient`].
///
/// Missing credentials count as unhealthy.
pub struct GoogleProbe {
    client: Arc<GoogleClient>,
}

impl GoogleProbe {
    pub fn new(client: Arc<GoogleClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for GoogleProbe {
    async fn check(&self) -> bool {
        self.client.health_check().await
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: bool,
    pub google: bool,
    pub timestamp: String,
}

/// GET /health — unauthenticated dependency check; 503 when anything is down.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let (database, google) = tokio::join!(state.probes.database.check(), state.probes.google.check());
    let healthy = database && google;

    let status = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" },
        database,
        google,
        timestamp: Utc::now().to_rfc3339(),
    };
    let body = ApiResponse {
        success: healthy,
        data: Some(status),
        error: None,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}
