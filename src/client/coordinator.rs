//! Client-side single-flight renewal coordination.
//!
//! Many concurrent requests can discover an expired access token at the same
//! moment. The coordinator makes sure only the first of them performs the
//! renewal exchange; everyone else queues as a waiter and is released in one
//! batch when the in-flight attempt settles, then retries with the renewed
//! credential. State machine: `Idle -> Refreshing -> Idle`.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

use super::session::SessionHandle;
use crate::session::TokenPair;

/// Errors from a renewal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    /// The server rejected the refresh token. Terminal: the renewal call is
    /// never retried and the caller must re-authenticate.
    Rejected,
    /// Transport failure (timeout, connection refused, bad payload).
    Network(String),
    /// No refresh token in hand to renew with.
    NoSession,
    /// The in-flight renewal was dropped before settling.
    Interrupted,
}

impl std::fmt::Display for RenewalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewalError::Rejected => write!(f, "Renewal rejected by server"),
            RenewalError::Network(e) => write!(f, "Renewal transport failure: {}", e),
            RenewalError::NoSession => write!(f, "No session to renew"),
            RenewalError::Interrupted => write!(f, "Renewal interrupted before settling"),
        }
    }
}

impl std::error::Error for RenewalError {}

/// The renewal network exchange, kept behind a trait so tests can substitute
/// a scripted transport.
#[async_trait::async_trait]
pub trait RenewalExchange: Send + Sync {
    /// Exchange a refresh token for a new pair at the renewal endpoint.
    async fn renew(&self, refresh_token: &str) -> Result<TokenPair, RenewalError>;
}

/// Waiters queued behind the in-flight renewal.
struct RefreshLock {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<Result<(), RenewalError>>>,
}

/// Serializes renewal attempts and fans the outcome out to waiters.
///
/// One instance per client. The lock state is a plain mutex held only across
/// non-await sections; the check-and-set of `in_progress` and every waiter
/// queue mutation happen under it.
pub struct RefreshCoordinator {
    session: SessionHandle,
    exchange: Arc<dyn RenewalExchange>,
    lock: Mutex<RefreshLock>,
}

impl RefreshCoordinator {
    pub fn new(session: SessionHandle, exchange: Arc<dyn RenewalExchange>) -> Self {
        Self {
            session,
            exchange,
            lock: Mutex::new(RefreshLock {
                in_progress: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Ensure the session has been renewed since this call began.
    ///
    /// The first caller in performs the exchange; callers arriving while it
    /// is in flight queue up and share its outcome. At most one renewal
    /// network call is outstanding at any time, and every queued waiter is
    /// resolved exactly once when the attempt settles.
    pub async fn acquire_refreshed_session(&self) -> Result<(), RenewalError> {
        let waiter = {
            let mut lock = self.lock.lock().expect("refresh lock poisoned");
            if lock.in_progress {
                let (tx, rx) = oneshot::channel();
                lock.waiters.push(tx);
                Some(rx)
            } else {
                lock.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("renewal already in flight; waiting for its outcome");
            return match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(RenewalError::Interrupted),
            };
        }

        // We are the in-flight attempt. The guard makes the broadcast happen
        // on every exit path, including this future being dropped mid-await.
        let guard = SettleGuard { lock: &self.lock };
        let outcome = self.renew_once().await;
        guard.settle(outcome)
    }

    async fn renew_once(&self) -> Result<(), RenewalError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(RenewalError::NoSession);
        };

        match self.exchange.renew(&refresh_token).await {
            Ok(pair) => {
                debug!("session renewed");
                self.session.set(pair);
                Ok(())
            }
            Err(e) => {
                // Whatever we were holding no longer buys anything; the
                // caller has to authenticate from scratch.
                debug!(error = %e, "renewal failed; clearing session");
                self.session.clear();
                Err(e)
            }
        }
    }
}

/// Releases the waiter queue and returns the lock to idle, exactly once.
struct SettleGuard<'a> {
    lock: &'a Mutex<RefreshLock>,
}

impl<'a> SettleGuard<'a> {
    fn settle(self, outcome: Result<(), RenewalError>) -> Result<(), RenewalError> {
        release(self.lock, &outcome);
        std::mem::forget(self);
        outcome
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        release(self.lock, &Err(RenewalError::Interrupted));
    }
}

fn release(lock: &Mutex<RefreshLock>, outcome: &Result<(), RenewalError>) {
    let waiters = {
        let mut lock = lock.lock().expect("refresh lock poisoned");
        lock.in_progress = false;
        std::mem::take(&mut lock.waiters)
    };
    for waiter in waiters {
        let _ = waiter.send(outcome.clone());
    }
}
