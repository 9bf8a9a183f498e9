//! Client-side session state.

use std::sync::{Arc, RwLock};

use crate::session::TokenPair;

/// Shared handle to the client's current token pair.
///
/// Cloned freely between the gateway and the coordinator; all clones see the
/// same underlying state. Each independent client gets its own handle, so
/// tests never share session state by accident.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<TokenPair>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored pair (login or successful renewal).
    pub fn set(&self, pair: TokenPair) {
        *self.inner.write().expect("session lock poisoned") = Some(pair);
    }

    /// Drop the stored pair (logout or terminal renewal failure).
    pub fn clear(&self) {
        *self.inner.write().expect("session lock poisoned") = None;
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|pair| pair.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|pair| pair.refresh.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().expect("session lock poisoned").is_some()
    }
}
