use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rusqlite::Connection;
use steward_audit::ActionLog;
use steward_core::StewardConfig;
use steward_google::{CalendarService, GoogleClient, MailService};
use steward_memory::{MemoryService, MemoryStore, OpenAiEmbedder};
use steward_scheduler::{HandlerRegistry, SqliteTaskStore, TaskRunner, TaskService};
use tokio::signal;
use tracing::{info, warn};

mod app;
mod auth;
mod http;

#[derive(Parser)]
#[command(
    name = "steward-gateway",
    version,
    about = "Personal assistant backend: reminders, semantic memory and an audit trail over HTTP"
)]
struct Cli {
    /// Path to steward.toml (defaults to ~/.steward/steward.toml).
    #[arg(short, long, env = "STEWARD_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "steward_gateway=info,steward_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = StewardConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        StewardConfig::default()
    });
    if config.gateway.api_key.is_none() {
        warn!("gateway.api_key is not set; every API request will be rejected");
    }

    // single SQLite file for all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    steward_audit::db::init_db(&db)?;
    steward_scheduler::db::init_db(&db)?;
    steward_memory::db::init_db(&db)?;
    info!("database migrations complete");

    // each subsystem gets its own connection
    let audit = Arc::new(ActionLog::new(
        Connection::open(&db_path)?,
        config.audit.clone(),
    )?);
    let api_tasks = Arc::new(TaskService::new(
        Arc::new(SqliteTaskStore::new(Connection::open(&db_path)?)?),
        audit.clone(),
    ));
    let runner_tasks = Arc::new(TaskService::new(
        Arc::new(SqliteTaskStore::new(Connection::open(&db_path)?)?),
        audit.clone(),
    ));
    let memory = MemoryService::new(
        Arc::new(OpenAiEmbedder::new(&config.embeddings)),
        Arc::new(MemoryStore::new(Connection::open(&db_path)?)?),
        audit.clone(),
    );
    let google = Arc::new(GoogleClient::new(config.google.clone())?);
    if !google.is_configured() {
        warn!("Google credentials not configured; calendar and mail routes are disabled");
    }
    let calendar = CalendarService::new(google.clone(), audit.clone());
    let mail = MailService::new(google.clone(), audit.clone());
    let probes = app::HealthProbes {
        database: Arc::new(http::health::DatabaseProbe::new(db)),
        google: Arc::new(http::health::GoogleProbe::new(google)),
    };

    let runner = TaskRunner::new(
        runner_tasks,
        HandlerRegistry::with_defaults(&config.scheduler)?,
        audit.clone(),
        Duration::from_millis(config.scheduler.poll_interval_ms),
    );
    let runner = runner.start();

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState {
        config,
        tasks: api_tasks,
        memory,
        calendar,
        mail,
        audit,
        probes,
    });
    let router = app::build_router(state);

    info!("Steward gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for task runner");
    runner.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "could not create database directory");
        }
    }
}
