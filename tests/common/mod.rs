//! Common test utilities for qadeck integration tests.
//!
//! Provides `TestEnv` for CLI runs against an isolated data directory and
//! `TestApp` for driving the API router in-process.

#![allow(dead_code)]

use assert_cmd::Command;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use qadeck::auth::{Argon2PasswordHasher, DEMO_DEV_TOKEN, DEMO_QA_TOKEN, TokenSigner};
use qadeck::server::{AppState, build_router};
use qadeck::storage::Storage;
use qadeck::upload::LocalObjectStore;
use serde_json::{Value, json};
use std::sync::Arc;
pub use tempfile::TempDir;
use tower::ServiceExt;

/// A test environment with isolated data storage.
///
/// The `qadeck()` method returns a `Command` pointing `QADECK_DATA_DIR` at the
/// temporary directory and clearing the other variables the resolver reads,
/// making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the qadeck binary with isolated data directory.
    pub fn qadeck(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_qadeck"));
        cmd.env("QADECK_DATA_DIR", self.data_dir.path());
        cmd.env_remove("QADECK_HOST");
        cmd.env_remove("QADECK_PORT");
        cmd.env_remove("QADECK_TOKEN_SECRET");
        cmd.env_remove("QADECK_LOG_JSON");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub const QA: &str = DEMO_QA_TOKEN;
pub const DEV: &str = DEMO_DEV_TOKEN;

/// The API router over a temporary data directory, demo tokens enabled.
pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        qadeck::logging::init_test_logging();
        let dir = TempDir::new().unwrap();
        let mut storage = Storage::open(dir.path()).unwrap();
        qadeck::commands::auth::ensure_demo_users(&mut storage).unwrap();

        let upload_dir = dir.path().join("uploads");
        let objects = LocalObjectStore::new(&upload_dir).unwrap();
        let state = AppState::new(
            storage,
            TokenSigner::new("integration-secret", 1, true),
            Arc::new(Argon2PasswordHasher::with_cost(8, 1)),
            Arc::new(objects),
            max_upload_bytes,
        );
        let router = build_router(state, &upload_dir);
        Self { router, dir }
    }

    /// Send a request and decode the JSON response (`Null` for empty bodies).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>) -> (StatusCode, Value,
    ) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    /// Register an account and return its token and user ID.
    pub async fn register(&self, username: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "name": username,
                    "username": username,
                    "password": "secret",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Create a project as `token`, returning its ID.
    pub async fn project(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/projects", token, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Add an existing account to a project by username.
    pub async fn add_member(
        &self,
        token: &str,
        project_id: &str,
        username: &str,
        role: &str) -> (StatusCode, Value,
    ) {
        self.post(
            &format!("/api/projects/{}/members", project_id),
            token,
            json!({ "username": username, "role": role }),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
