mod auth;
mod error;

use axum::Router;

pub use auth::{
    AuthState, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RevokeResponse,
    SessionInfo, SessionListResponse, TokenPairBody, UserBody,
};
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(state: AuthState) -> Router {
    Router::new().nest("/auth", auth::router(state))
}
