//! Shared helpers for HTTP-level tests: an in-memory app and request builders.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use rota_api::AppState;
use rota_core::auth::{AuthConfig, AuthOrchestrator, MemoryCredentialStore};
use rota_core::clock::ManualClock;
use rota_core::ledger::MemorySessionStore;
use rota_core::models::User;
use tower::ServiceExt;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "analytical-engine";

pub struct TestApp {
    pub router: Router,
    pub auth: Arc<AuthOrchestrator>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub clock: ManualClock,
    pub user: User,
}

/// Build the router over in-memory stores with one registered user.
pub async fn test_app(session_cap: usize) -> TestApp {
    let mut auth_config = AuthConfig::with_secrets("test-access-secret", "test-refresh-secret");
    auth_config.session_cap = session_cap;

    let clock = ManualClock::default();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let user = credentials
        .add_user(EMAIL, PASSWORD)
        .await
        .expect("add user");
    let auth = Arc::new(AuthOrchestrator::new(
        auth_config,
        credentials.clone(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(clock.clone()),
    ));

    let state = AppState {
        auth: auth.clone(),
    };

    TestApp {
        router: rota_api::router(state),
        auth,
        credentials,
        clock,
        user,
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("request")
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "rota-tests/1.0")
        .body(Body::from(body.to_string()))
        .expect("build request");
    send(app, req).await
}

pub async fn post_auth(app: &Router, uri: &str, bearer: &str) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .expect("build request");
    send(app, req).await
}

pub async fn get_auth(app: &Router, uri: &str, bearer: &str) -> Response<Body> {
    let req = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .expect("build request");
    send(app, req).await
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

/// Log in via the API and return the token response body.
pub async fn login(app: &Router) -> serde_json::Value {
    let resp = post_json(
        app,
        "/auth/login",
        serde_json::json!({ "email": EMAIL, "password": PASSWORD }),
    )
    .await;
    assert_eq!(resp.status(), axum::http::StatusCode::OK);
    body_json(resp).await
}

pub fn str_field<'a>(json: &'a serde_json::Value, key: &str) -> &'a str {
    json[key].as_str().unwrap_or_else(|| panic!("missing '{key}' in {json}"))
}
