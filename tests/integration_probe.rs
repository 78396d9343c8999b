/// Integration connection tests against a mocked third-party service
mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::TestApp;
use mewayz_api::auth::Role;
use mewayz_api::integration_probe::IntegrationProbe;

#[tokio::test]
async fn test_probe_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let probe = IntegrationProbe::new(Duration::from_secs(2)).unwrap();
    let outcome = probe.check(&format!("{}/", mock_server.uri()), "/status").await;

    assert!(outcome.ok);
    assert_eq!(outcome.status_code, Some(200));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_probe_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let probe = IntegrationProbe::new(Duration::from_millis(300)).unwrap();
    let outcome = probe.check(&mock_server.uri(), "/health").await;

    assert!(!outcome.ok);
    assert!(outcome.status_code.is_none());
    assert!(outcome.error.unwrap().contains("Timed out"));
}

#[tokio::test]
async fn test_connection_test_marks_integration_active() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let app = TestApp::new();
    let token = app.token(Role::Manager);
    let id = app
        .create(
            "/api/v1/integrations",
            &token,
            "integration",
            json!({
                "name": "Mailer",
                "provider": "mailer",
                "category": "email",
                "baseUrl": mock_server.uri(),
            }),
        )
        .await;

    let (status, body) = app
        .post(&format!("/api/v1/integrations/{}/test", id), &token, json!({}))
        .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["result"]["ok"], true);
    assert_eq!(body["data"]["result"]["statusCode"], 204);

    let integration = &body["data"]["integration"];
    assert_eq!(integration["status"], "active");
    assert!(integration["lastCheckedAt"].is_string());
    assert!(integration["lastLatencyMs"].is_u64());
    assert!(integration.get("lastError").is_none());
}

#[tokio::test]
async fn test_connection_test_records_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let app = TestApp::new();
    let token = app.token(Role::Admin);
    let id = app
        .create(
            "/api/v1/integrations",
            &token,
            "integration",
            json!({
                "name": "Payments",
                "provider": "payco",
                "category": "payments",
                "baseUrl": mock_server.uri(),
                "healthPath": "/v2/ping",
            }),
        )
        .await;

    let (status, body) = app
        .post(&format!("/api/v1/integrations/{}/test", id), &token, json!({}))
        .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["result"]["ok"], false);
    assert_eq!(body["data"]["result"]["statusCode"], 503);
    assert_eq!(body["data"]["integration"]["status"], "error");
    assert!(body["data"]["integration"]["lastError"]
        .as_str()
        .unwrap()
        .contains("503"));

    // the recorded status is filterable
    let (_, body) = app.get("/api/v1/integrations?status=error", &token).await;
    assert_eq!(body["total"], 1);

    let user = app.token(Role::User);
    let (status, _) = app
        .post(&format!("/api/v1/integrations/{}/test", id), &user, json!({}))
        .await;
    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
}
