//! Outbound request gateway with automatic token renewal.
//!
//! Every call goes out with the current access token attached. On a 401 the
//! gateway asks the coordinator for a renewed session and re-sends the
//! original call exactly once; the renewal endpoint itself and calls that
//! already retried propagate their 401 unchanged.

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::coordinator::{RefreshCoordinator, RenewalError};
use super::session::SessionHandle;
use super::transport::{HttpRenewalExchange, RENEWAL_PATH};
use crate::api::{LoginRequest, LoginResponse, LogoutRequest, UserBody};
use crate::session::TokenPair;

/// Default timeout for outbound calls, renewal included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An outbound call and its retry tag.
///
/// The tag lives on this wrapper, never on a transport object: a call is
/// retried at most once no matter how many sibling calls fail alongside it.
struct OutboundCall {
    method: Method,
    url: Url,
    body: Option<Value>,
    retried: bool,
}

/// Errors surfaced by the gateway.
#[derive(Debug)]
pub enum GatewayError {
    /// The path could not be joined onto the base URL.
    InvalidUrl(url::ParseError),
    /// Transport-level failure from the HTTP client.
    Transport(reqwest::Error),
    /// Renewal failed; the caller must re-authenticate.
    Renewal(RenewalError),
    /// The server rejected the credentials on a typed call.
    Unauthorized,
    /// Any other non-success status on a typed call.
    Unexpected(StatusCode),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::InvalidUrl(e) => write!(f, "Invalid request URL: {}", e),
            GatewayError::Transport(e) => write!(f, "Transport error: {}", e),
            GatewayError::Renewal(e) => write!(f, "{}", e),
            GatewayError::Unauthorized => write!(f, "Unauthorized"),
            GatewayError::Unexpected(status) => write!(f, "Unexpected status: {}", status),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<RenewalError> for GatewayError {
    fn from(e: RenewalError) -> Self {
        GatewayError::Renewal(e)
    }
}

/// HTTP client wrapper that owns the session state and the coordinator.
pub struct RequestGateway {
    http: reqwest::Client,
    base: Url,
    session: SessionHandle,
    coordinator: Arc<RefreshCoordinator>,
}

impl RequestGateway {
    /// Build a gateway for the given server base URL.
    pub fn new(base: Url) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GatewayError::Transport)?;

        let session = SessionHandle::new();
        let exchange =
            HttpRenewalExchange::new(http.clone(), &base).map_err(GatewayError::InvalidUrl)?;
        let coordinator = Arc::new(RefreshCoordinator::new(session.clone(), Arc::new(exchange)));

        Ok(Self {
            http,
            base,
            session,
            coordinator,
        })
    }

    /// Build a gateway from preassembled parts.
    /// Lets callers wire a custom renewal exchange or a shared session handle.
    pub fn from_parts(
        http: reqwest::Client,
        base: Url,
        session: SessionHandle,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            base,
            session,
            coordinator,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn get(&self, path: &str) -> Result<Response, GatewayError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Response, GatewayError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Send a call, renewing the session and re-sending once on a 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, GatewayError> {
        let url = self.base.join(path).map_err(GatewayError::InvalidUrl)?;
        let mut call = OutboundCall {
            method,
            url,
            body,
            retried: false,
        };

        loop {
            let response = self.dispatch(&call).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            // The renewal endpoint is reserved; its 401 is terminal.
            if call.url.path() == RENEWAL_PATH {
                return Ok(response);
            }

            // One retry per call, and only when there is something to renew.
            if call.retried || !self.session.is_authenticated() {
                return Ok(response);
            }

            call.retried = true;
            debug!(url = %call.url, "401 received; requesting renewed session");
            self.coordinator.acquire_refreshed_session().await?;
        }
    }

    async fn dispatch(&self, call: &OutboundCall) -> Result<Response, GatewayError> {
        let mut request = self.http.request(call.method.clone(), call.url.clone());
        if let Some(token) = self.session.access_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        request.send().await.map_err(GatewayError::Transport)
    }

    // ---- typed auth calls ----

    /// Log in and store the returned token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserBody, GatewayError> {
        let url = self
            .base
            .join("/auth/login")
            .map_err(GatewayError::InvalidUrl)?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(GatewayError::Transport)?;

        match response.status() {
            StatusCode::OK => {
                let body: LoginResponse =
                    response.json().await.map_err(GatewayError::Transport)?;
                self.session.set(TokenPair {
                    access: body.access_token,
                    refresh: body.refresh_token,
                });
                Ok(body.user)
            }
            StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
            status => Err(GatewayError::Unexpected(status)),
        }
    }

    /// Log out: revoke the refresh session server-side, clear local state.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        if let Some(refresh_token) = self.session.refresh_token() {
            let url = self
                .base
                .join("/auth/logout")
                .map_err(GatewayError::InvalidUrl)?;
            let result = self
                .http
                .post(url)
                .json(&LogoutRequest { refresh_token })
                .send()
                .await;

            if let Err(e) = result {
                debug!(error = %e, "logout request failed; clearing local session anyway");
            }
        }

        self.session.clear();
        Ok(())
    }

    /// Fetch the current user through the interception pipeline.
    pub async fn me(&self) -> Result<UserBody, GatewayError> {
        let response = self.get("/auth/me").await?;
        match response.status() {
            StatusCode::OK => response.json().await.map_err(GatewayError::Transport),
            StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
            status => Err(GatewayError::Unexpected(status)),
        }
    }
}
