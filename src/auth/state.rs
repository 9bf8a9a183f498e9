//! Authentication state trait.

use crate::jwt::TokenIssuer;
use crate::users::UserDirectory;

/// Trait for state types that provide what the auth extractor needs.
pub trait HasAuthState {
    fn issuer(&self) -> &TokenIssuer;
    fn users(&self) -> &UserDirectory;
}
