//! HTTP gateway notifier tests against a local mock gateway

use gasmon::notify::{HttpNotifier, HttpNotifierConfig, Notifier};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "k3y-7731";

fn notifier_for(server: &MockServer, timeout: Duration) -> HttpNotifier {
    HttpNotifier::new(HttpNotifierConfig {
        endpoint: format!("{}/whatsapp.php", server.uri()),
        recipient: "5511999999999".to_string(),
        api_key: API_KEY.to_string(),
        timeout,
    })
    .unwrap()
}

#[tokio::test]
async fn test_successful_delivery_sends_encoded_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whatsapp.php"))
        .and(query_param("phone", "5511999999999"))
        .and(query_param("text", "🚨 GAS ALERT\nLPG: 2100.00 ppm"))
        .and(query_param("apikey", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_string("Message queued"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = notifier_for(&server, Duration::from_secs(5))
        .send("🚨 GAS ALERT\nLPG: 2100.00 ppm")
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.detail.as_deref(), Some("HTTP 200 - Message queued"));
}

#[tokio::test]
async fn test_non_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("APIKey is invalid"))
        .mount(&server)
        .await;

    let outcome = notifier_for(&server, Duration::from_secs(5))
        .send("hello")
        .await;

    assert!(!outcome.ok);
    let detail = outcome.detail.unwrap();
    assert!(detail.starts_with("HTTP 403 - "));
    assert!(detail.contains("APIKey is invalid"));
}

#[tokio::test]
async fn test_long_bodies_are_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(5000)))
        .mount(&server)
        .await;

    let outcome = notifier_for(&server, Duration::from_secs(5))
        .send("hello")
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.detail.unwrap(), format!("HTTP 200 - {}", "x".repeat(200)));
}

#[tokio::test]
async fn test_api_key_never_appears_in_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(format!("bad request for key {API_KEY}")),
        )
        .mount(&server)
        .await;

    let outcome = notifier_for(&server, Duration::from_secs(5))
        .send("hello")
        .await;

    assert!(!outcome.ok);
    assert!(!outcome.detail.unwrap().contains(API_KEY));
}

#[tokio::test]
async fn test_timeout_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let outcome = notifier_for(&server, Duration::from_millis(200))
        .send("hello")
        .await;

    assert!(!outcome.ok);
    let detail = outcome.detail.unwrap();
    assert!(detail.contains("is_timeout: true"), "detail was: {detail}");
    assert!(!detail.contains(API_KEY));
}

#[tokio::test]
async fn test_unreachable_gateway_is_a_failure() {
    let notifier = HttpNotifier::new(HttpNotifierConfig {
        endpoint: "http://127.0.0.1:1/whatsapp.php".to_string(),
        recipient: "5511999999999".to_string(),
        api_key: API_KEY.to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let outcome = notifier.send("hello").await;

    assert!(!outcome.ok);
    let detail = outcome.detail.unwrap();
    assert!(detail.starts_with("Request failed"));
    assert!(!detail.contains(API_KEY));
}
