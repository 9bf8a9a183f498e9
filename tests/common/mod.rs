#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use keyturn::api::AuthState;
use keyturn::users::UserDirectory;
use keyturn::{ServerConfig, build_state, run_server};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

pub const TEST_ACCESS_SECRET: &[u8] = b"access-secret-for-integration-tests";
pub const TEST_REFRESH_SECRET: &[u8] = b"refresh-secret-for-integration-tests";

/// Config with the demo admin user seeded and a test-friendly rate limit.
pub fn test_config() -> ServerConfig {
    test_config_with_ttls(
        keyturn::jwt::ACCESS_TOKEN_TTL_SECS,
        keyturn::jwt::REFRESH_TOKEN_TTL_SECS,
    )
}

pub fn test_config_with_ttls(access_ttl_secs: u64, refresh_ttl_secs: u64) -> ServerConfig {
    let users = Arc::new(UserDirectory::new());
    users.insert("admin", "password123");

    ServerConfig {
        users,
        access_secret: TEST_ACCESS_SECRET.to_vec(),
        refresh_secret: TEST_REFRESH_SECRET.to_vec(),
        access_ttl_secs,
        refresh_ttl_secs,
        login_attempts_per_minute: NonZeroU32::new(1000).unwrap(),
    }
}

/// Start a live server on a random port for client-side tests.
/// Returns the server handle, its base URL, and the shared state so tests
/// can observe the session store directly.
pub async fn start_live_server(config: &ServerConfig) -> (tokio::task::JoinHandle<()>, Url, AuthState) {
    let state = build_state(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");

    let server_state = state.clone();
    let handle = tokio::spawn(async move {
        run_server(server_state, listener).await.ok();
    });

    let base = Url::parse(&format!("http://{}", addr)).expect("Invalid URL");
    (handle, base, state)
}

/// POST a JSON body through the router and return (status, parsed body).
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    split(response).await
}

/// GET with an optional bearer token.
pub async fn get_with_bearer(
    app: &Router,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    split(response).await
}

/// DELETE with a bearer token.
pub async fn delete_with_bearer(
    app: &Router,
    uri: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    split(response).await
}

/// Login through the router and return (status, parsed body).
pub async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    post_json(
        app,
        "/auth/login",
        serde_json::json!({ "username": username, "password": password }),
    )
    .await
}

async fn split(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
