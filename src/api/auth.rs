//! Authentication API endpoints.
//!
//! - POST `/login` - Exchange username/password for an access/refresh pair
//! - POST `/refresh` - Exchange a refresh token for a new pair (single-use)
//! - POST `/logout` - Revoke a refresh token
//! - GET `/me` - Current user from a valid access token
//! - GET `/verify` - Lightweight access token check
//! - GET `/sessions` - List the caller's refresh sessions
//! - DELETE `/sessions/{token_id}` - Revoke a specific refresh session

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::auth::{ApiAuth, HasAuthState};
use crate::jwt::{CredentialError, TokenIssuer};
use crate::rate_limit::LoginRateLimit;
use crate::session::{RotationError, Session, SessionState, SessionStore};
use crate::users::UserDirectory;

#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<UserDirectory>,
    pub issuer: Arc<TokenIssuer>,
    pub sessions: Arc<SessionStore>,
    pub login_rate: LoginRateLimit,
}

impl HasAuthState for AuthState {
    fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    fn users(&self) -> &UserDirectory {
        &self.users
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/verify", get(verify))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{token_id}", delete(revoke_session))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBody {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserBody,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairBody {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub token_id: String,
    pub state: &'static str,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        SessionInfo {
            token_id: session.token_id,
            state: match session.state {
                SessionState::Active => "active",
                SessionState::Consumed => "consumed",
                SessionState::Revoked => "revoked",
            },
            issued_at: session.issued_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Authenticate with username/password and receive a token pair.
async fn login(
    State(state): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.login_rate.check(&req.username) {
        return Err(ApiError::too_many_requests("Too many login attempts"));
    }

    let user = state
        .users
        .authenticate(&req.username, &req.password)
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let pair = state
        .sessions
        .issue(&user.id, &user.username)
        .map_err(|e| ApiError::internal_error("Failed to issue tokens", e))?;

    info!(username = %user.username, "login");

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            access_token: pair.access,
            refresh_token: pair.refresh,
            user: UserBody {
                id: user.id,
                username: user.username,
            },
        }),
    ))
}

/// Exchange a refresh token for a new access/refresh pair.
///
/// The old refresh token is consumed; presenting it again is a replay and
/// is rejected.
async fn refresh(
    State(state): State<AuthState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = state
        .sessions
        .rotate(&req.refresh_token)
        .map_err(|e| match e {
            RotationError::Replay => ApiError::unauthorized("Refresh token already used or revoked"),
            RotationError::Credential(CredentialError::WrongKind) => {
                ApiError::unauthorized("Not a refresh token")
            }
            RotationError::Credential(CredentialError::Expired) => {
                ApiError::unauthorized("Refresh token has expired")
            }
            RotationError::Credential(
                e @ (CredentialError::Encoding(_) | CredentialError::TimeError),
            ) => ApiError::internal_error("Failed to rotate tokens", e),
            RotationError::Credential(_) => ApiError::unauthorized("Invalid refresh token"),
        })?;

    Ok(Json(TokenPairBody {
        access_token: pair.access,
        refresh_token: pair.refresh,
    }))
}

/// Logout - revoke the refresh session. Always succeeds.
async fn logout(
    State(state): State<AuthState>,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    state.sessions.revoke(&req.refresh_token);
    Json(serde_json::json!({ "success": true }))
}

/// Return the authenticated user's identity.
async fn me(
    State(state): State<AuthState>,
    ApiAuth(claims): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .get(&claims.username)
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(Json(UserBody {
        id: user.id,
        username: user.username,
    }))
}

/// Verify that the current access token is still valid.
/// Returns 200 if valid, 401 if not.
async fn verify(ApiAuth(_claims): ApiAuth) -> impl IntoResponse {
    StatusCode::OK
}

/// List all refresh sessions for the current user.
async fn list_sessions(
    State(state): State<AuthState>,
    ApiAuth(claims): ApiAuth,
) -> impl IntoResponse {
    let sessions = state
        .sessions
        .sessions_for(&claims.sub)
        .into_iter()
        .map(SessionInfo::from)
        .collect();

    Json(SessionListResponse { sessions })
}

/// Revoke a specific refresh session by token id.
/// Users can only revoke their own sessions.
async fn revoke_session(
    State(state): State<AuthState>,
    ApiAuth(claims): ApiAuth,
    Path(token_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.sessions.get(&token_id) {
        Some(session) if session.subject != claims.sub => {
            Err(ApiError::forbidden("Cannot revoke another user's session"))
        }
        Some(_) => {
            let revoked = state.sessions.revoke_by_id(&token_id);
            Ok(Json(RevokeResponse { revoked }))
        }
        // Already evicted or never existed
        None => Ok(Json(RevokeResponse { revoked: false })),
    }
}
