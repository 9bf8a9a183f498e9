//! HTTP renewal exchange against the reserved refresh endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use super::coordinator::{RenewalError, RenewalExchange};
use crate::api::{RefreshRequest, TokenPairBody};
use crate::session::TokenPair;

/// The reserved renewal path. The gateway never intercepts calls to it, and
/// the exchange below posts to it directly, so a 401 from renewal can never
/// trigger another renewal.
pub const RENEWAL_PATH: &str = "/auth/refresh";

/// Performs the real renewal call over reqwest.
pub struct HttpRenewalExchange {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpRenewalExchange {
    pub fn new(http: reqwest::Client, base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            endpoint: base.join(RENEWAL_PATH)?,
        })
    }
}

#[async_trait]
impl RenewalExchange for HttpRenewalExchange {
    async fn renew(&self, refresh_token: &str) -> Result<TokenPair, RenewalError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| RenewalError::Network(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(RenewalError::Rejected);
        }
        if !response.status().is_success() {
            return Err(RenewalError::Network(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: TokenPairBody = response
            .json()
            .await
            .map_err(|e| RenewalError::Network(e.to_string()))?;

        Ok(TokenPair {
            access: body.access_token,
            refresh: body.refresh_token,
        })
    }
}
