//! Shared harness: the full router over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use mewayz_api::auth::Role;
use mewayz_api::config::Config;
use mewayz_api::crypto::generate_key;
use mewayz_api::handlers::AppState;
use mewayz_api::memory_store::MemoryStore;
use mewayz_api::routes::build_router;

pub const JWT_SECRET: &str = "test-secret-that-is-at-least-32-characters";

pub fn test_config() -> Config {
    Config {
        database_url: "memory://".to_string(),
        port: 0,
        db_max_connections: 1,
        jwt_secret: JWT_SECRET.to_string(),
        field_encryption_key: generate_key(),
        default_page_limit: 20,
        max_page_limit: 100,
        default_phone_region: phonenumber::country::Id::US,
        integration_timeout: Duration::from_secs(2),
        rate_limit_per_second: 10,
        rate_limit_burst: 20,
        white_label_cache_ttl: Duration::from_secs(300),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub workspace: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        let state = Arc::new(
            AppState::new(test_config(), Arc::new(MemoryStore::new())).expect("state"),
        );
        let router = build_router(state.clone(), None).expect("router");
        Self {
            router,
            state,
            workspace: Uuid::new_v4(),
        }
    }

    /// Token for a fresh user of this app's workspace.
    pub fn token(&self, role: Role) -> String {
        self.token_for(Uuid::new_v4(), self.workspace, role)
    }

    pub fn token_for(&self, user: Uuid, workspace: Uuid, role: Role) -> String {
        self.state
            .jwt
            .issue(user, workspace, role, chrono::Duration::hours(1))
            .expect("token")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a document and returns its id.
    pub async fn create(&self, uri: &str, token: &str, key: &str, body: Value) -> String {
        let (status, json) = self.post(uri, token, body).await;
        assert_eq!(status, StatusCode::CREATED, "create {} failed: {}", uri, json);
        json["data"][key]["id"].as_str().expect("id").to_string()
    }
}
