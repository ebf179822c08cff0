//! HTTP router tests driven through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sonic_lagmgrd::rpc::LagResponse;
use sonic_lagmgrd::server::router;
use sonic_lagmgrd::{LagMetrics, LagRegistry, LagService, LagStatus};
use std::time::Duration;
use tower::ServiceExt;

fn new_service() -> LagService {
    LagService::new(
        LagRegistry::new(),
        LagMetrics::new().unwrap(),
        Duration::from_millis(200),
    )
}

fn ready_app() -> (Router, LagService) {
    let service = new_service();
    service.gate().open();
    (router(service.clone()), service)
}

async fn call(app: &Router, operation: &str, body: Value) -> (StatusCode, LagResponse) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/Net.LagManagement/{}", operation))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_create_lag_returns_id() {
    let (app, _) = ready_app();

    let (status, body) = call(
        &app,
        "CreateLag",
        json!({"lag_id": "PortChannel1", "members": [{"id": "Ethernet0"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, LagStatus::Ok);
    assert_eq!(body.lag_id.as_deref(), Some("PortChannel1"));

    let (status, body) = call(&app, "CreateLag", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.lag_id.as_deref(), Some("PortChannel0001"));
}

#[tokio::test]
async fn test_status_codes() {
    let (app, _) = ready_app();
    call(
        &app,
        "CreateLag",
        json!({"lag_id": "PortChannel1", "members": [{"id": "Ethernet0"}]}),
    )
    .await;

    let (status, body) = call(&app, "CreateLag", json!({"lag_id": "PortChannel1"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, LagStatus::AlreadyExists);

    call(&app, "CreateLag", json!({"lag_id": "PortChannel2"})).await;
    let (status, body) = call(
        &app,
        "AddLagMember",
        json!({"lag_id": "PortChannel2", "members": [{"id": "Ethernet0"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, LagStatus::AlreadyMember);

    let (status, body) = call(&app, "DeleteLag", json!({"lag_id": "PortChannel9"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.status, LagStatus::NotFound);
    assert!(body.message.is_some());

    let (status, body) = call(
        &app,
        "AddLagMember",
        json!({"lag_id": "PortChannel2", "members": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.status, LagStatus::InvalidArgument);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let (app, service) = ready_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/Net.LagManagement/DeleteLag")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"lag\":"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: LagResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.status, LagStatus::InvalidArgument);
    assert_eq!(service.registry().read().await.lag_count(), 0);
}

#[tokio::test]
async fn test_member_lifecycle_and_queries() {
    let (app, _) = ready_app();
    call(&app, "CreateLag", json!({"lag_id": "PortChannel1"})).await;

    let (status, _) = call(
        &app,
        "AddLagMember",
        json!({"lag_id": "PortChannel1", "members": [{"id": "Ethernet4"}, {"id": "Ethernet0"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "RemoveLagMember",
        json!({"lag_id": "PortChannel1", "members": [{"id": "Ethernet4"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GetLag", json!({"lag_id": "PortChannel1"})).await;
    assert_eq!(status, StatusCode::OK);
    let lag = body.lag.unwrap();
    assert_eq!(lag.lag_id, "PortChannel1");
    let members: Vec<&str> = lag.members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(members, vec!["Ethernet0"]);

    call(&app, "CreateLag", json!({"lag_id": "PortChannel0"})).await;
    let (status, body) = call(&app, "ListLags", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<String> = body.lags.unwrap().into_iter().map(|l| l.lag_id).collect();
    assert_eq!(ids, vec!["PortChannel0", "PortChannel1"]);
}

#[tokio::test]
async fn test_not_ready_returns_busy_and_not_serving() {
    let service = new_service();
    let app = router(service.clone());

    let (status, body) = call(&app, "CreateLag", json!({"lag_id": "PortChannel1"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.status, LagStatus::Busy);

    let (status, health) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(health.contains("NOT_SERVING"));

    service.gate().open();
    let (status, health) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(health.contains("\"SERVING\""));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = ready_app();
    call(&app, "CreateLag", json!({"lag_id": "PortChannel1"})).await;
    call(&app, "CreateLag", json!({"lag_id": "PortChannel1"})).await;

    let (status, text) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("lagmgrd_lags 1"));
    assert!(text.contains(
        "lagmgrd_operations_total{operation=\"create_lag\",status=\"AlreadyExists\"} 1"
    ));
}
