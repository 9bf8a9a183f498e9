//! End-to-end tests for the client gateway against a live server.
//!
//! These cover the renewal pipeline as a whole: expired access token,
//! 401 detection, single-flight renewal, and the one-shot retry.

mod common;

use common::{start_live_server, test_config, test_config_with_ttls};
use futures::future::join_all;
use keyturn::client::{GatewayError, RenewalError, RequestGateway};
use keyturn::session::SessionState;
use std::time::Duration;

#[tokio::test]
async fn test_login_me_logout_flow() {
    let (server, base, _state) = start_live_server(&test_config()).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();
    assert_eq!(user.username, "admin");
    assert!(gateway.session().is_authenticated());

    let me = gateway.me().await.unwrap();
    assert_eq!(me.id, user.id);

    gateway.logout().await.unwrap();
    assert!(!gateway.session().is_authenticated());

    // Without credentials the protected call propagates its 401
    assert!(matches!(gateway.me().await, Err(GatewayError::Unauthorized)));

    server.abort();
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (server, base, _state) = start_live_server(&test_config()).await;
    let gateway = RequestGateway::new(base).unwrap();

    let result = gateway.login("admin", "hunter2").await;

    assert!(matches!(result, Err(GatewayError::Unauthorized)));
    assert!(!gateway.session().is_authenticated());

    server.abort();
}

#[tokio::test]
async fn test_expired_access_token_renewed_and_retried() {
    let (server, base, state) = start_live_server(&test_config_with_ttls(1, 3600)).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();
    let old_access = gateway.session().access_token().unwrap();
    let old_refresh = gateway.session().refresh_token().unwrap();

    // Let the access token expire
    tokio::time::sleep(Duration::from_secs(2)).await;

    let me = gateway.me().await.unwrap();
    assert_eq!(me.username, "admin");

    // The gateway renewed behind the scenes: both tokens rotated, and the
    // server consumed the original refresh session
    assert_ne!(gateway.session().access_token().unwrap(), old_access);
    assert_ne!(gateway.session().refresh_token().unwrap(), old_refresh);

    let sessions = state.sessions.sessions_for(&user.id);
    assert_eq!(sessions.len(), 2);

    server.abort();
}

#[tokio::test]
async fn test_concurrent_401s_share_a_single_renewal() {
    let (server, base, state) = start_live_server(&test_config_with_ttls(1, 3600)).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Six concurrent calls all hit 401 on the same expired generation
    let results = join_all((0..6).map(|_| gateway.me())).await;

    for result in &results {
        assert_eq!(result.as_ref().unwrap().username, "admin");
    }

    // Exactly one rotation took place: the original session consumed, one
    // active replacement
    let sessions = state.sessions.sessions_for(&user.id);
    assert_eq!(sessions.len(), 2);
    let active = sessions
        .iter()
        .filter(|s| s.state == SessionState::Active)
        .count();
    assert_eq!(active, 1);

    server.abort();
}

#[tokio::test]
async fn test_renewal_rejection_fans_out_and_clears_session() {
    let (server, base, state) = start_live_server(&test_config_with_ttls(1, 3600)).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();

    // Revoke the session server-side so the upcoming renewal is rejected
    for session in state.sessions.sessions_for(&user.id) {
        state.sessions.revoke_by_id(&session.token_id);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let results = join_all((0..4).map(|_| gateway.me())).await;

    // Every caller fails cleanly; whoever shared the in-flight renewal sees
    // its rejection, a caller arriving after the session was cleared sees a
    // plain 401.
    for result in &results {
        assert!(
            matches!(
                result,
                Err(GatewayError::Renewal(_)) | Err(GatewayError::Unauthorized)
            ),
            "renewal failure must surface to every caller"
        );
    }
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(GatewayError::Renewal(_))))
    );
    assert!(!gateway.session().is_authenticated());

    // The coordinator is idle again: a fresh login flows normally
    gateway.login("admin", "password123").await.unwrap();
    assert_eq!(gateway.me().await.unwrap().username, "admin");

    server.abort();
}

#[tokio::test]
async fn test_renewal_endpoint_401_is_not_intercepted() {
    let (server, base, state) = start_live_server(&test_config()).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();

    let response = gateway
        .post(
            "/auth/refresh",
            serde_json::json!({ "refreshToken": "garbage" }),
        )
        .await
        .unwrap();

    // Propagated unchanged: no renewal was attributed to this call
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(state.sessions.sessions_for(&user.id).len(), 1);
    assert!(gateway.session().is_authenticated());

    server.abort();
}

#[tokio::test]
async fn test_rejected_renewal_error_carries_rejection() {
    let (server, base, state) = start_live_server(&test_config_with_ttls(1, 3600)).await;
    let gateway = RequestGateway::new(base).unwrap();

    let user = gateway.login("admin", "password123").await.unwrap();
    for session in state.sessions.sessions_for(&user.id) {
        state.sessions.revoke_by_id(&session.token_id);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(matches!(
        gateway.me().await,
        Err(GatewayError::Renewal(RenewalError::Rejected))
    ));

    server.abort();
}
