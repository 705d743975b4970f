//! MediaWiki client tests against a local mock `api.php`.

use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wiki_graph::links::{LinkError, LinkSource, RateLimiter, WikiClient};

/// Serves "Rust" in two pages of links, "Empty" with no `query`, and 503 for "Down".
async fn api(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    assert_eq!(params.get("action").map(String::as_str), Some("query"));
    assert_eq!(params.get("prop").map(String::as_str), Some("links"));

    let title = params.get("titles").cloned().unwrap_or_default();
    match (title.as_str(), params.get("plcontinue").map(String::as_str)) {
        ("Rust", None) => (
            StatusCode::OK,
            Json(json!({
                "continue": {"plcontinue": "123|0|Mozilla", "continue": "||"},
                "query": {"pages": {"123": {"pageid": 123, "title": "Rust",
                    "links": [{"ns": 0, "title": "Cargo"}, {"ns": 0, "title": "LLVM"}]}}}
            })),
        ),
        ("Rust", Some("123|0|Mozilla")) => (
            StatusCode::OK,
            Json(json!({
                "batchcomplete": "",
                "query": {"pages": {"123": {"pageid": 123, "title": "Rust",
                    "links": [{"ns": 0, "title": "Mozilla"}]}}}
            })),
        ),
        ("Down", _) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))),
        ("Lonely", _) => (
            StatusCode::OK,
            Json(json!({"query": {"pages": {"-1": {"ns": 0, "title": "Lonely", "missing": ""}}}})),
        ),
        _ => (StatusCode::OK, Json(json!({"batchcomplete": ""}))),
    }
}

async fn spawn_mock() -> SocketAddr {
    let app = Router::new().route("/w/api.php", get(api));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, rps: u32) -> WikiClient {
    WikiClient::new(
        format!("http://{}/w/api.php", addr),
        rps,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn follows_continuation_cursor() {
    let addr = spawn_mock().await;
    let links = client(addr, 1000).get_edges("Rust").await.unwrap();
    assert_eq!(links, vec!["Cargo", "LLVM", "Mozilla"]);
}

#[tokio::test]
async fn missing_query_is_an_empty_edge_set() {
    let addr = spawn_mock().await;
    let client = client(addr, 1000);
    assert!(client.get_edges("Empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_page_is_unavailable() {
    let addr = spawn_mock().await;
    let err = client(addr, 1000).get_edges("Lonely").await.unwrap_err();
    assert!(matches!(err, LinkError::Unavailable(title) if title == "Lonely"));
}

#[tokio::test]
async fn error_status_is_reported() {
    let addr = spawn_mock().await;
    let err = client(addr, 1000).get_edges("Down").await.unwrap_err();
    assert!(matches!(err, LinkError::Status(503)));
}

#[tokio::test]
async fn every_page_request_takes_a_permit() {
    let addr = spawn_mock().await;
    let limiter = Arc::new(RateLimiter::new(20));
    let client = WikiClient::with_http_client(
        reqwest::Client::new(),
        format!("http://{}/w/api.php", addr),
        Arc::clone(&limiter),
    );

    let started = tokio::time::Instant::now();
    // Two requests for "Rust" plus one for "Empty": the third permit is two intervals out
    client.get_edges("Rust").await.unwrap();
    client.get_edges("Empty").await.unwrap();
    assert!(started.elapsed() >= limiter.interval() * 2 - Duration::from_millis(5));
}
