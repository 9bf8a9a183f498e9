//! Bearer-token authentication for API endpoints.
//!
//! Dual-token system: short-lived access tokens (stateless) and long-lived
//! refresh tokens (tracked in the session store). Protected endpoints accept
//! the access token in the `Authorization: Bearer` header; renewal happens
//! client-side through the refresh endpoint, never implicitly here.

mod bearer;
mod errors;
mod extractors;
mod state;

pub use bearer::bearer_token;
pub use errors::ApiAuthError;
pub use extractors::ApiAuth;
pub use state::HasAuthState;
