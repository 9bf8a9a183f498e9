//! Server-side session registry for refresh token rotation.
//!
//! Every issued refresh token owns exactly one [`Session`], keyed by the
//! token's JTI. Rotation is single-use: exchanging a refresh token atomically
//! moves its session from `Active` to `Consumed`, so a second exchange of the
//! same token is rejected as a replay. Access tokens are stateless and never
//! tracked here.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

use crate::jwt::{CredentialError, TokenIssuer, TokenKind};

/// Lifecycle state of a refresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Issued and exchangeable.
    Active,
    /// Rotated away; any further use of the token is a replay.
    Consumed,
    /// Explicitly revoked (logout).
    Revoked,
}

/// A refresh session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub token_id: String,
    pub subject: String,
    pub username: String,
    pub state: SessionState,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// An access/refresh token pair as handed to clients.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Registry of outstanding refresh sessions.
///
/// Reads are concurrent; state transitions serialize per token id on the
/// map's per-key write guard. No global lock.
pub struct SessionStore {
    issuer: Arc<TokenIssuer>,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self {
            issuer,
            sessions: DashMap::new(),
        }
    }

    /// Mint a fresh access/refresh pair for a subject and register the
    /// refresh session as `Active`.
    pub fn issue(&self, subject: &str, username: &str) -> Result<TokenPair, CredentialError> {
        let (pair, session) = self.mint(subject, username)?;
        self.sessions.insert(session.token_id.clone(), session);
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, consuming it.
    ///
    /// The `Active -> Consumed` transition is a test-and-set under the
    /// per-key write guard: two concurrent exchanges of the same token yield
    /// exactly one winner, the other fails with [`RotationError::Replay`].
    /// Every failure path leaves the store unchanged.
    pub fn rotate(&self, refresh_token: &str) -> Result<TokenPair, RotationError> {
        let claims = self.issuer.verify(refresh_token, TokenKind::Refresh)?;
        let token_id = claims
            .jti
            .ok_or(RotationError::Credential(CredentialError::Malformed))?;

        // Mint the replacement before touching the session so a signing
        // failure cannot leave the old session consumed without a successor.
        let (pair, new_session) = self.mint(&claims.sub, &claims.username)?;

        {
            let mut session = self.sessions.get_mut(&token_id).ok_or_else(|| {
                warn!(token_id = %token_id, "refresh token not registered; treating as replay");
                RotationError::Replay
            })?;
            if session.state != SessionState::Active {
                warn!(
                    token_id = %token_id,
                    subject = %session.subject,
                    "refresh token replay detected"
                );
                return Err(RotationError::Replay);
            }
            session.state = SessionState::Consumed;
        }

        self.sessions
            .insert(new_session.token_id.clone(), new_session);
        Ok(pair)
    }

    /// Revoke the session behind a refresh token (logout).
    ///
    /// Best-effort and idempotent: an invalid or unknown token has nothing
    /// to revoke.
    pub fn revoke(&self, refresh_token: &str) {
        let Ok(claims) = self.issuer.verify(refresh_token, TokenKind::Refresh) else {
            return;
        };
        let Some(token_id) = claims.jti else {
            return;
        };
        self.revoke_by_id(&token_id);
    }

    /// Look up a session by token id.
    pub fn get(&self, token_id: &str) -> Option<Session> {
        self.sessions.get(token_id).map(|s| s.value().clone())
    }

    /// Revoke a specific session by token id. Returns whether it existed.
    pub fn revoke_by_id(&self, token_id: &str) -> bool {
        match self.sessions.get_mut(token_id) {
            Some(mut session) => {
                session.state = SessionState::Revoked;
                true
            }
            None => false,
        }
    }

    /// Snapshot the sessions belonging to a subject, newest first.
    pub fn sessions_for(&self, subject: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.subject == subject)
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        sessions
    }

    /// Drop every session whose refresh token has expired, in any state.
    ///
    /// A consumed or expired token id need not be remembered past its own
    /// expiry: the signature check already rejects the token itself.
    /// Returns the number of evicted sessions.
    pub fn evict_expired(&self, now: u64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before - self.sessions.len()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn mint(&self, subject: &str, username: &str) -> Result<(TokenPair, Session), CredentialError> {
        let access = self.issuer.issue_access(subject, username)?;
        let grant = self.issuer.issue_refresh(subject, username)?;

        let session = Session {
            token_id: grant.token_id,
            subject: subject.to_string(),
            username: username.to_string(),
            state: SessionState::Active,
            issued_at: grant.issued_at,
            expires_at: grant.expires_at,
        };

        Ok((
            TokenPair {
                access,
                refresh: grant.token,
            },
            session,
        ))
    }
}

/// Errors from exchanging a refresh token.
#[derive(Debug)]
pub enum RotationError {
    /// The presented token failed verification.
    Credential(CredentialError),
    /// The token was already consumed, revoked, or never registered.
    Replay,
}

impl From<CredentialError> for RotationError {
    fn from(e: CredentialError) -> Self {
        RotationError::Credential(e)
    }
}

impl std::fmt::Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationError::Credential(e) => write!(f, "{}", e),
            RotationError::Replay => write!(f, "Refresh token already used or revoked"),
        }
    }
}

impl std::error::Error for RotationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_store() -> SessionStore {
        let issuer = Arc::new(TokenIssuer::new(
            b"access-secret-for-testing",
            b"refresh-secret-for-testing",
        ));
        SessionStore::new(issuer)
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_rotate_succeeds_once() {
        let store = test_store();
        let pair = store.issue("1", "admin").unwrap();

        let rotated = store.rotate(&pair.refresh).unwrap();
        assert_ne!(rotated.refresh, pair.refresh);
        assert_ne!(rotated.access, pair.access);

        // The rotated-away token is now a replay
        assert!(matches!(
            store.rotate(&pair.refresh),
            Err(RotationError::Replay)
        ));

        // The replacement still works
        assert!(store.rotate(&rotated.refresh).is_ok());
    }

    #[test]
    fn test_rotate_rejects_access_token() {
        let store = test_store();
        store.issue("1", "admin").unwrap();

        let issuer = TokenIssuer::new(b"access-secret-for-testing", b"refresh-secret-for-testing");
        let access = issuer.issue_access("1", "admin").unwrap();

        assert!(matches!(
            store.rotate(&access),
            Err(RotationError::Credential(CredentialError::WrongKind))
        ));
    }

    #[test]
    fn test_rotate_after_revoke_is_replay() {
        let store = test_store();
        let pair = store.issue("1", "admin").unwrap();

        store.revoke(&pair.refresh);
        assert!(matches!(
            store.rotate(&pair.refresh),
            Err(RotationError::Replay)
        ));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let store = test_store();
        let pair = store.issue("1", "admin").unwrap();

        store.revoke(&pair.refresh);
        store.revoke(&pair.refresh);
        store.revoke("garbage");

        assert!(matches!(
            store.rotate(&pair.refresh),
            Err(RotationError::Replay)
        ));
    }

    #[test]
    fn test_revoke_by_id_unknown_returns_false() {
        let store = test_store();
        assert!(!store.revoke_by_id("no-such-token"));
    }

    #[test]
    fn test_concurrent_rotation_has_exactly_one_winner() {
        let store = test_store();
        let pair = store.issue("1", "admin").unwrap();

        let results: Vec<Result<TokenPair, RotationError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.rotate(&pair.refresh)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one rotation must win the race");
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(RotationError::Replay)))
        );
    }

    #[test]
    fn test_sessions_for_subject() {
        let store = test_store();
        store.issue("1", "admin").unwrap();
        store.issue("1", "admin").unwrap();
        store.issue("2", "alice").unwrap();

        let sessions = store.sessions_for("1");
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.state == SessionState::Active));

        assert_eq!(store.sessions_for("2").len(), 1);
        assert!(store.sessions_for("3").is_empty());
    }

    #[test]
    fn test_evict_expired_bounds_the_store() {
        let issuer = Arc::new(
            TokenIssuer::new(b"access-secret-for-testing", b"refresh-secret-for-testing")
                .with_ttls(60, 0),
        );
        let store = SessionStore::new(issuer);
        store.issue("1", "admin").unwrap();
        store.issue("1", "admin").unwrap();

        assert_eq!(store.len(), 2);
        let evicted = store.evict_expired(now());
        assert_eq!(evicted, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_keeps_live_sessions() {
        let store = test_store();
        store.issue("1", "admin").unwrap();

        assert_eq!(store.evict_expired(now()), 0);
        assert_eq!(store.len(), 1);
    }
}
