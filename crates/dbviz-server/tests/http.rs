//! HTTP catalogue routes.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use dbviz_server::config::ServerConfig;
use dbviz_server::router::build_router;
use dbviz_server::state::AppState;

fn test_app() -> Router {
    let config = ServerConfig {
        tick: Duration::from_millis(10),
        ..ServerConfig::default()
    };
    build_router(AppState::new(&config))
}

async fn get(app: &Router, path: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let (status, bytes) = get(app, path).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = get(&test_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn lists_projects() {
    let (status, body) = get_json(&test_app(), "/api/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["btree", "mvcc", "query-parser"]);
    assert!(body["data"][0]["operations"]
        .as_array()
        .unwrap()
        .contains(&Value::from("insert")));
}

#[tokio::test]
async fn lists_topics_with_availability() {
    let (status, body) = get_json(&test_app(), "/api/topics").await;
    assert_eq!(status, StatusCode::OK);
    let topics = body["data"].as_array().unwrap();
    assert_eq!(topics.len(), 10);
    let wal = topics.iter().find(|t| t["id"] == "wal").unwrap();
    assert_eq!(wal["category"], "transaction");
    assert_eq!(wal["available"], false);
    let mvcc = topics.iter().find(|t| t["id"] == "mvcc").unwrap();
    assert_eq!(mvcc["available"], true);
}

#[tokio::test]
async fn lists_and_fetches_scenarios() {
    let app = test_app();
    let (status, body) = get_json(&app, "/api/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 12);

    let (status, body) = get_json(&app, "/api/scenarios/split-demo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["project"], "btree");
    assert_eq!(body["data"]["config"]["initialKeys"], serde_json::json!([10, 20, 30]));
}

#[tokio::test]
async fn unknown_scenario_is_404() {
    let (status, body) = get_json(&test_app(), "/api/scenarios/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
