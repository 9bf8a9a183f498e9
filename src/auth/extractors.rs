//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::bearer::bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthState;
use crate::jwt::{Claims, TokenKind};

/// Extractor for API endpoints that require a valid access token.
///
/// Validates the bearer token against the access secret and kind tag. An
/// expired access token is simply rejected with 401; renewal is the client's
/// job via the refresh endpoint.
pub struct ApiAuth(pub Claims);

impl<S> FromRequestParts<S> for ApiAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))?;

        let claims = state
            .issuer()
            .verify(token, TokenKind::Access)
            .map_err(|_| ApiAuthError::new(AuthErrorKind::InvalidToken))?;

        if state.users().get(&claims.username).is_none() {
            return Err(ApiAuthError::new(AuthErrorKind::UserNotFound));
        }

        Ok(ApiAuth(claims))
    }
}
