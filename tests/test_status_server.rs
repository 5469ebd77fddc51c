//! Status endpoint tests using warp's in-process test client

use gasmon::config::EngineSection;
use gasmon::monitor::{Engine, NotificationQueue};
use gasmon::observability::StatusServer;
use serde_json::Value;
use std::sync::Arc;

/// The queue is returned so it stays open for the duration of a test
fn server_with_engine() -> (Arc<StatusServer>, Arc<Engine>, NotificationQueue) {
    let (engine, queue) = Engine::new(EngineSection::default());
    let engine = Arc::new(engine);
    (Arc::new(StatusServer::new(0, engine.clone())), engine, queue)
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response should be JSON")
}

#[tokio::test]
async fn test_health_is_unavailable_until_mqtt_connects() {
    let (server, _engine, _queue) = server_with_engine();
    let routes = server.routes();

    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 503);
    let body = json_body(response.body());
    assert_eq!(body["checks"]["mqtt"]["status"], "unhealthy");

    server.set_mqtt_connected(true);
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);
    let body = json_body(response.body());
    assert_eq!(body["status"], "healthy");
    assert!(body["current_tier"].is_null());
}

#[tokio::test]
async fn test_health_reports_current_tier() {
    let (server, engine, _queue) = server_with_engine();
    server.set_mqtt_connected(true);
    engine.ingest_reading(2500.0).unwrap();

    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&server.routes())
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(json_body(response.body())["current_tier"], "DANGER");
}

#[tokio::test]
async fn test_snapshot_returns_engine_state() {
    let (server, engine, _queue) = server_with_engine();
    engine.ingest_reading(400.0).unwrap();
    engine.ingest_reading(1400.0).unwrap();
    engine.ingest_alert(1900.0).unwrap();

    let response = warp::test::request()
        .method("GET")
        .path("/snapshot")
        .reply(&server.routes())
        .await;

    assert_eq!(response.status(), 200);
    let body = json_body(response.body());
    assert_eq!(body["readings"].as_array().unwrap().len(), 2);
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(body["current"]["value"], 1400.0);
    assert_eq!(body["current"]["tier"], "WARNING");
    assert_eq!(body["last_alert"]["value"], 1900.0);
}

#[tokio::test]
async fn test_metrics_and_index_endpoints() {
    let (server, _engine, _queue) = server_with_engine();
    let routes = server.routes();

    let metrics = warp::test::request()
        .method("GET")
        .path("/metrics")
        .reply(&routes)
        .await;
    assert_eq!(metrics.status(), 200);
    assert!(json_body(metrics.body()).is_object());

    let index = warp::test::request().method("GET").path("/").reply(&routes).await;
    assert_eq!(index.status(), 200);
    let endpoints = &json_body(index.body())["endpoints"];
    assert!(endpoints.get("/health").is_some());
    assert!(endpoints.get("/snapshot").is_some());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (server, _engine, _queue) = server_with_engine();

    let response = warp::test::request()
        .method("GET")
        .path("/nope")
        .reply(&server.routes())
        .await;

    assert_eq!(response.status(), 404);
}
