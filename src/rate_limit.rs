//! Rate limiting for the login endpoint.
//!
//! Token bucket keyed per username to slow down credential guessing against
//! a single account.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

/// Default login attempts allowed per username per minute.
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-username limiter for login attempts.
#[derive(Clone)]
pub struct LoginRateLimit {
    limiter: Arc<KeyedLimiter>,
}

impl LoginRateLimit {
    pub fn new(attempts_per_minute: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(attempts_per_minute))),
        }
    }

    /// Whether another attempt is allowed for this username right now.
    pub fn check(&self, username: &str) -> bool {
        self.limiter.check_key(&username.to_string()).is_ok()
    }
}
