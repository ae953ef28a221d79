//! HTTP router tests against an unreachable Docker engine and a scripted exec runtime

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use dockhand::config::AppConfig;

use common::app;

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_degraded_without_engine() {
    let (status, body) = send(app(AppConfig::default()), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["docker_version"], Value::Null);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn engine_errors_map_to_bad_gateway() {
    let (status, body) = send(app(AppConfig::default()), Method::GET, "/api/v1/containers?all=true", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RUNTIME_UNAVAILABLE");
}

#[tokio::test]
async fn exec_runs_command_through_runtime() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/containers/abc123/exec",
        Some(json!({ "command": "echo hello", "timeout_seconds": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["container_id"], "abc123");
    assert_eq!(body["command"], "echo hello");
    assert_eq!(body["output"], "hello from container\n");
}

#[tokio::test]
async fn exec_rejects_empty_command() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/containers/abc123/exec",
        Some(json!({ "command": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn exec_on_missing_container_is_reported() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/containers/missing/exec",
        Some(json!({ "command": "ls" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("No such container"));
}

#[tokio::test]
async fn metrics_route_follows_config() {
    let mut config = AppConfig::default();
    config.metrics.enabled = false;

    let (status, _) = send(app(config), Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = send(app(AppConfig::default()), Method::GET, "/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_container_validates_before_calling_engine() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/containers",
        Some(json!({
            "image": "nginx",
            "name": "-bad",
            "ports": [
                { "host_port": 8080, "container_port": 80 },
                { "host_port": 8080, "container_port": 81 }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Invalid container name"), "unexpected message: {}", message);
    assert!(message.contains("Duplicate host port mapping: 8080/tcp"));
}

#[tokio::test]
async fn create_container_reaches_engine() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/containers",
        Some(json!({ "image": "nginx:1.25", "restart_policy": "always", "memory_limit_mb": 256 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RUNTIME_UNAVAILABLE");
}

#[tokio::test]
async fn stats_and_inspect_routes_reach_engine() {
    for uri in [
        "/api/v1/containers/abc123/stats",
        "/api/v1/containers/abc123/inspect",
        "/api/v1/networks/net1",
    ] {
        let (status, body) = send(app(AppConfig::default()), Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{}", uri);
        assert_eq!(body["error"], "RUNTIME_UNAVAILABLE", "{}", uri);
    }
}

#[tokio::test]
async fn create_network_requires_name() {
    let (status, body) = send(
        app(AppConfig::default()),
        Method::POST,
        "/api/v1/networks",
        Some(json!({ "name": " ", "driver": "bridge" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Network name is required");
}
