pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod jwt;
pub mod rate_limit;
pub mod session;
pub mod users;

use api::{AuthState, create_api_router};
use axum::Router;
use jwt::TokenIssuer;
use rate_limit::LoginRateLimit;
use session::SessionStore;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;
use users::UserDirectory;

pub struct ServerConfig {
    /// User registry (injected so tests can seed their own users)
    pub users: Arc<UserDirectory>,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
    /// Login attempts allowed per username per minute
    pub login_attempts_per_minute: NonZeroU32,
}

/// Assemble the server-side state from the configuration.
pub fn build_state(config: &ServerConfig) -> AuthState {
    let issuer = Arc::new(
        TokenIssuer::new(&config.access_secret, &config.refresh_secret)
            .with_ttls(config.access_ttl_secs, config.refresh_ttl_secs),
    );
    let sessions = Arc::new(SessionStore::new(issuer.clone()));
    let login_rate = LoginRateLimit::new(config.login_attempts_per_minute);

    AuthState {
        users: config.users.clone(),
        issuer,
        sessions,
        login_rate,
    }
}

/// Create the application router with the given state.
pub fn create_app(state: AuthState) -> Router {
    create_api_router(state)
}

/// Run eviction once and spawn the background scheduler.
/// Call this before starting the server.
pub fn init_cleanup(store: &Arc<SessionStore>) {
    cleanup::run_eviction(store);
    cleanup::spawn_eviction_scheduler(store.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to start the eviction scheduler.
pub async fn run_server(state: AuthState, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(state);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: &ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let state = build_state(config);
    init_cleanup(&state.sessions);

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(state, listener).await.ok();
    });

    (handle, local_addr)
}
