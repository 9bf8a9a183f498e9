//! HTTP client with transparent token renewal.
//!
//! The gateway attaches the current access token to every outbound call.
//! When a call comes back 401, the coordinator performs a single renewal
//! exchange on behalf of every concurrent failure, then each failed call is
//! re-sent exactly once with the fresh credential. A failure of the renewal
//! itself clears the local session and surfaces as a terminal error.

mod coordinator;
mod gateway;
mod session;
mod transport;

pub use coordinator::{RefreshCoordinator, RenewalError, RenewalExchange};
pub use gateway::{GatewayError, RequestGateway};
pub use session::SessionHandle;
pub use transport::{HttpRenewalExchange, RENEWAL_PATH};
