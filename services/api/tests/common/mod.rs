//! Shared helpers for the HTTP-level tests
//!
//! Every test builds its own [`TestApp`] over a fresh [`MemoryStore`], so
//! tests never observe each other's rows.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use blog_api::{
    AppState, accounts,
    config::AppConfig,
    create_router,
    models::{NewUser, User},
    password::hash_password,
    store::{BlogStore, MemoryStore},
};

pub const PASSWORD: &str = "testpass123";

/// Test application wrapper using the real router over an in-memory store
pub struct TestApp {
    router: Router,
    pub store: MemoryStore,
    pub state: AppState,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let media = TempDir::new().expect("Failed to create media dir");
        let config = AppConfig {
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_seconds: 3600,
            media_root: media.path().to_string_lossy().into_owned(),
            max_upload_bytes,
        };

        let store = MemoryStore::new();
        let state = AppState::new(Arc::new(store.clone()), &config);
        let router = create_router(state.clone());

        Self {
            router,
            store,
            state,
            media,
        }
    }

    /// Send a request to the test application
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a JSON request and decode the JSON response
    pub async fn json(
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
        .expect("Failed to build request");

        let response = self.request(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::DELETE, uri, token, None).await
    }

    /// Create a regular user and return it with a valid token
    pub async fn user(&self, email: &str) -> (User, String) {
        let user = accounts::create_user(&self.store, email, PASSWORD, "Test name")
            .await
            .expect("Failed to create user");
        let token = self.token_for(&user);
        (user, token)
    }

    /// Create a staff user (not a superuser) and return it with a valid token
    pub async fn staff(&self, email: &str) -> (User, String) {
        let hash = hash_password(PASSWORD).await.expect("Failed to hash password");
        let mut new_user = NewUser::new(email, "", hash).expect("Invalid user");
        new_user.is_staff = true;
        let user = self
            .store
            .create_user(new_user)
            .await
            .expect("Failed to create staff user");
        let token = self.token_for(&user);
        (user, token)
    }

    /// Create a superuser and return it with a valid token
    pub async fn superuser(&self, email: &str) -> (User, String) {
        let user = accounts::create_superuser(&self.store, email, PASSWORD)
            .await
            .expect("Failed to create superuser");
        let token = self.token_for(&user);
        (user, token)
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.jwt.issue(user.id).expect("Failed to issue token")
    }

    pub async fn has_user(&self, email: &str) -> bool {
        self.store
            .find_user_by_email(email)
            .await
            .expect("Store failed")
            .is_some()
    }

    pub async fn delete_user(&self, id: i64) {
        self.store.delete_user(id).await.expect("Failed to delete user");
    }
}

/// Read a response body as JSON; empty bodies decode to `Value::Null`
pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    }
}

/// A minimal valid post payload
pub fn post_payload(title: &str) -> Value {
    serde_json::json!({
        "title": title,
        "content": "Test content",
        "read_time_min": 5,
    })
}
