//! Request server tests over real HTTP on an ephemeral port.

use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use wiki_graph::cli::client::ApiClient;
use wiki_graph::db::Database;
use wiki_graph::queue::{Broker, Producer, SqliteBroker};
use wiki_graph::server::start_server;
use wiki_graph::service::PathService;
use wiki_graph::types::{TaskResult, TaskStatus};

const KEY: &str = "task";

async fn spawn_server() -> (Database, SocketAddr, oneshot::Sender<()>) {
    let db = Database::open_in_memory().unwrap();
    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::new(
        db.clone(),
        Duration::from_secs(60),
        Duration::ZERO,
    ));
    let service = PathService::new(db.clone(), Producer::new(broker, KEY));
    let (shutdown, addr) = start_server(service, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    (db, addr, shutdown)
}

#[tokio::test]
async fn create_then_poll_task() {
    let (db, addr, _shutdown) = spawn_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("http://{}/api/tasks", addr))
        .json(&json!({"from": "A", "to": "D"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    assert_eq!(db.count_queued_messages(KEY).unwrap(), 1);

    let body: Value = http
        .get(format!("http://{}/api/tasks/{}", addr, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["from"], "A");
    assert!(body["path"].is_null());
}

#[tokio::test]
async fn done_task_exposes_its_path() {
    let (db, addr, _shutdown) = spawn_server().await;
    let task = db.create_task("A", "B").unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();
    db.set_result(task.id, &TaskResult::new(vec!["a".into(), "b".into()]))
        .unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Processing, TaskStatus::Done)
        .unwrap();

    let client = ApiClient::new(format!("http://{}/", addr)).unwrap();
    let view = client.get_task(&task.id.to_string()).await.unwrap();
    assert_eq!(view.status, TaskStatus::Done);
    assert_eq!(view.path, Some(vec!["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn empty_endpoint_is_rejected() {
    let (db, addr, _shutdown) = spawn_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("http://{}/api/tasks", addr))
        .json(&json!({"from": "  ", "to": "D"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["field"], "from");

    let counts = db.count_tasks_by_status().unwrap();
    assert_eq!(counts.pending, 0);
    assert_eq!(db.count_queued_messages(KEY).unwrap(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_field_error() {
    let (db, addr, _shutdown) = spawn_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("http://{}/api/tasks", addr))
        .header("content-type", "application/json")
        .body("{\"from\": \"A\",")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_FIELD_VALUE");
    assert_eq!(body["field"], "body");

    let response = http
        .post(format!("http://{}/api/tasks", addr))
        .body(r#"{"from": "A", "to": "D"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "body");

    assert_eq!(db.count_tasks_by_status().unwrap().pending, 0);
}

#[tokio::test]
async fn malformed_and_unknown_ids() {
    let (_db, addr, _shutdown) = spawn_server().await;
    let http = reqwest::Client::new();

    let response = http
        .get(format!("http://{}/api/tasks/not-a-uuid", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = http
        .get(format!("http://{}/api/tasks/{}", addr, uuid::Uuid::now_v7()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn health_reports_counts() {
    let (db, addr, _shutdown) = spawn_server().await;
    db.create_task("A", "B").unwrap();

    let body: Value = reqwest::get(format!("http://{}/api/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tasks"]["pending"], 1);
    assert_eq!(body["tasks"]["done"], 0);
}

#[tokio::test]
async fn api_client_creates_tasks_and_surfaces_errors() {
    let (db, addr, _shutdown) = spawn_server().await;
    let client = ApiClient::new(format!("http://{}", addr)).unwrap();

    let id = client.create_task("Rust", "Mozilla").await.unwrap();
    assert_eq!(db.get_task(id).unwrap().from, "Rust");

    let err = client.create_task("Rust", "").await.unwrap_err();
    assert!(err.to_string().contains("MISSING_REQUIRED_FIELD"));

    let err = client
        .wait_for(&id.to_string(), Duration::from_millis(10), Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("pending"));
}
