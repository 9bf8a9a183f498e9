//! JWT credential generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token kind for distinguishing access vs refresh credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token (15 minutes) - stateless, no JTI
    Access,
    /// Long-lived refresh token (7 days) - tracked in the session store with JTI
    Refresh,
}

impl TokenKind {
    fn other(self) -> TokenKind {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

/// JWT claims shared by both token kinds.
///
/// `jti` is only minted for refresh tokens; access tokens carry no session
/// identity of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Username
    pub username: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// JWT ID (refresh tokens only, used as the session key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: u64,
}

/// Signs and verifies bearer credentials.
///
/// Access and refresh tokens use separate secrets and TTLs, and every
/// verification checks the embedded kind tag so one kind can never stand in
/// for the other. Stateless and safe to call concurrently.
pub struct TokenIssuer {
    access: KindKeys,
    refresh: KindKeys,
}

/// Result of minting a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    /// The JWT token string
    pub token: String,
    /// JWT ID (session key in the session store)
    pub token_id: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

impl TokenIssuer {
    /// Create an issuer with the given per-kind secrets and default TTLs.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: KindKeys {
                encoding: EncodingKey::from_secret(access_secret),
                decoding: DecodingKey::from_secret(access_secret),
                ttl: ACCESS_TOKEN_TTL_SECS,
            },
            refresh: KindKeys {
                encoding: EncodingKey::from_secret(refresh_secret),
                decoding: DecodingKey::from_secret(refresh_secret),
                ttl: REFRESH_TOKEN_TTL_SECS,
            },
        }
    }

    /// Override the default TTLs, in seconds.
    pub fn with_ttls(mut self, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        self.access.ttl = access_ttl_secs;
        self.refresh.ttl = refresh_ttl_secs;
        self
    }

    /// Duration in seconds of newly minted access tokens.
    pub fn access_ttl_secs(&self) -> u64 {
        self.access.ttl
    }

    /// Generate an access token for a user.
    pub fn issue_access(&self, subject: &str, username: &str) -> Result<String, CredentialError> {
        let now = unix_now()?;

        let claims = Claims {
            sub: subject.to_string(),
            username: username.to_string(),
            kind: TokenKind::Access,
            jti: None,
            iat: now,
            exp: now + self.access.ttl,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.access.encoding)
            .map_err(CredentialError::Encoding)
    }

    /// Generate a refresh token for a user with a fresh JTI.
    pub fn issue_refresh(
        &self,
        subject: &str,
        username: &str,
    ) -> Result<RefreshGrant, CredentialError> {
        let now = unix_now()?;
        let token_id = uuid::Uuid::new_v4().to_string();
        let exp = now + self.refresh.ttl;

        let claims = Claims {
            sub: subject.to_string(),
            username: username.to_string(),
            kind: TokenKind::Refresh,
            jti: Some(token_id.clone()),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh.encoding)
            .map_err(CredentialError::Encoding)?;

        Ok(RefreshGrant {
            token,
            token_id,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Validate and decode a token, enforcing the expected kind.
    ///
    /// Cross-kind use surfaces as a signature mismatch first, since each kind
    /// is signed with its own secret. Verification then re-checks the token
    /// against the other kind's key so it can be rejected as
    /// [`CredentialError::WrongKind`] instead of a generic signature failure.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, CredentialError> {
        match self.decode(token, expected) {
            Ok(claims) => {
                if claims.kind != expected {
                    return Err(CredentialError::WrongKind);
                }
                Ok(claims)
            }
            Err(CredentialError::InvalidSignature) => {
                match self.decode_unexpired(token, expected.other()) {
                    Some(claims) if claims.kind != expected => Err(CredentialError::WrongKind),
                    _ => Err(CredentialError::InvalidSignature),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(classify)
    }

    /// Decode with the given kind's key, skipping the expiry check.
    /// Only used to classify cross-kind presentations.
    fn decode_unexpired(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .ok()
    }
}

/// Map a jsonwebtoken decode failure onto the credential error taxonomy.
fn classify(e: jsonwebtoken::errors::Error) -> CredentialError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => CredentialError::Expired,
        ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
        _ => CredentialError::Malformed,
    }
}

fn unix_now() -> Result<u64, CredentialError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| CredentialError::TimeError)
}

/// Errors that can occur during credential operations.
#[derive(Debug)]
pub enum CredentialError {
    /// Token expiry has passed
    Expired,
    /// Signature does not match the expected kind's secret
    InvalidSignature,
    /// Token is not a structurally valid JWT for this system
    Malformed,
    /// Token is valid but of the other kind (e.g., access token presented
    /// where a refresh token is required)
    WrongKind,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Expired => write!(f, "Token has expired"),
            CredentialError::InvalidSignature => write!(f, "Invalid token signature"),
            CredentialError::Malformed => write!(f, "Malformed token"),
            CredentialError::WrongKind => write!(f, "Wrong token kind"),
            CredentialError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            CredentialError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for CredentialError {}
