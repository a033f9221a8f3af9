// End-to-end scheduling: reminder creation through delivery, plus
// concurrent claiming against one database file.

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::{json, Value};
use steward_audit::ActionLog;
use steward_core::config::{AuditConfig, SchedulerConfig};
use steward_scheduler::{
    CreateReminderRequest, HandlerRegistry, SqliteTaskStore, TaskRunner, TaskService, TaskStatus,
    TaskStore, TaskType,
};

struct Harness {
    store: Arc<SqliteTaskStore>,
    service: Arc<TaskService>,
    audit: Arc<ActionLog>,
}

fn harness() -> Harness {
    let store = Arc::new(SqliteTaskStore::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(
        ActionLog::new(Connection::open_in_memory().unwrap(), AuditConfig::default()).unwrap(),
    );
    let service = Arc::new(TaskService::new(store.clone(), audit.clone()));
    Harness {
        store,
        service,
        audit,
    }
}

fn runner(h: &Harness, cfg: &SchedulerConfig) -> TaskRunner {
    TaskRunner::new(
        h.service.clone(),
        HandlerRegistry::with_defaults(cfg).unwrap(),
        h.audit.clone(),
        Duration::from_millis(cfg.poll_interval_ms),
    )
}

fn call_bob() -> CreateReminderRequest {
    CreateReminderRequest {
        message: "Call Bob".into(),
        deliver_at: (Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(),
        context: None,
    }
}

/// Webhook sink that records every body and answers with `status`.
async fn spawn_sink(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/hook",
            post(
                move |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    received.lock().unwrap().push(body);
                    status
                },
            ),
        )
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

#[tokio::test]
async fn past_reminder_completes_on_next_cycle() {
    let h = harness();
    let task = h.service.create_reminder(&call_bob()).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let report = runner(&h, &SchedulerConfig::default())
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);

    let stored = h.store.get_by_id(&task.id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert!(stored.updated_at >= stored.created_at);

    let created = h.audit.by_tool_name("scheduler_create_reminder", None).unwrap();
    let executed = h.audit.by_tool_name("task_runner_execute", None).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].output_summary.as_deref(),
        Some("Task completed successfully")
    );
    assert!(executed[0].execution_time_ms.is_some());
}

#[tokio::test]
async fn reminder_is_posted_to_webhook() {
    let (url, received) = spawn_sink(StatusCode::OK).await;
    let cfg = SchedulerConfig {
        webhook_url: Some(url),
        ..SchedulerConfig::default()
    };
    let h = harness();
    let mut req = call_bob();
    req.context = Some("re: invoice".into());
    let task = h.service.create_reminder(&req).unwrap();

    runner(&h, &cfg).run_cycle().await.unwrap();

    assert_eq!(
        h.store.get_by_id(&task.id).unwrap().unwrap().status,
        TaskStatus::Completed
    );
    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["type"], "REMINDER");
    assert_eq!(bodies[0]["message"], "Call Bob");
    assert_eq!(bodies[0]["context"], "re: invoice");
    assert!(bodies[0]["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn rejected_webhook_fails_the_task() {
    let (url, _) = spawn_sink(StatusCode::INTERNAL_SERVER_ERROR).await;
    let cfg = SchedulerConfig {
        webhook_url: Some(url),
        ..SchedulerConfig::default()
    };
    let h = harness();
    let task = h.service.create_reminder(&call_bob()).unwrap();

    let report = runner(&h, &cfg).run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(
        h.store.get_by_id(&task.id).unwrap().unwrap().status,
        TaskStatus::Failed
    );
    let entry = &h.audit.by_tool_name("task_runner_execute", None).unwrap()[0];
    assert!(entry
        .output_summary
        .as_deref()
        .unwrap()
        .starts_with("Task failed: delivery failed with status 500"));
}

#[tokio::test]
async fn started_runner_picks_up_due_work() {
    let h = harness();
    let task = h.service.create_reminder(&call_bob()).unwrap();
    let cfg = SchedulerConfig {
        poll_interval_ms: 20,
        ..SchedulerConfig::default()
    };
    let handle = runner(&h, &cfg).start();

    let mut status = TaskStatus::Pending;
    for _ in 0..50 {
        status = h.store.get_by_id(&task.id).unwrap().unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.shutdown().await;
    assert_eq!(status, TaskStatus::Completed);
}

#[test]
fn concurrent_claims_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let a = SqliteTaskStore::new(Connection::open(&path).unwrap()).unwrap();
    let b = SqliteTaskStore::new(Connection::open(&path).unwrap()).unwrap();

    let due = Utc::now() - chrono::Duration::seconds(5);
    let created: HashSet<String> = (0..25)
        .map(|i| {
            a.create(TaskType::FollowUp, json!({ "n": i }), due)
                .unwrap()
                .id
        })
        .collect();

    let barrier = Barrier::new(2);
    let (left, right) = std::thread::scope(|s| {
        let l = s.spawn(|| {
            barrier.wait();
            a.claim_due().unwrap()
        });
        let r = s.spawn(|| {
            barrier.wait();
            b.claim_due().unwrap()
        });
        (l.join().unwrap(), r.join().unwrap())
    });

    let left: HashSet<String> = left.into_iter().map(|t| t.id).collect();
    let right: HashSet<String> = right.into_iter().map(|t| t.id).collect();
    assert!(left.is_disjoint(&right));
    assert_eq!(&left | &right, created);

    // everything is PROCESSING now; a third claim sees nothing
    assert!(a.claim_due().unwrap().is_empty());
}

#[test]
fn single_due_task_is_claimed_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let a = SqliteTaskStore::new(Connection::open(&path).unwrap()).unwrap();
    let b = SqliteTaskStore::new(Connection::open(&path).unwrap()).unwrap();
    a.create(
        TaskType::Reminder,
        json!({"message": "Call Bob", "context": null}),
        Utc::now() - chrono::Duration::seconds(1),
    )
    .unwrap();

    let barrier = Barrier::new(2);
    let counts = std::thread::scope(|s| {
        let handles = [&a, &b].map(|store| {
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                store.claim_due().unwrap().len()
            })
        });
        handles.map(|h| h.join().unwrap())
    });

    let mut counts = counts.to_vec();
    counts.sort_unstable();
    assert_eq!(counts, vec![0, 1]);
}
