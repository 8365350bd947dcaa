//! # AuthGate Core
//!
//! Authentication business logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for storage, HTTP, sockets and the terminal
//! - The browser (authorization code + PKCE) flow coordinator
//! - The RFC 8628 device flow poller
//! - The flow selector that ties cache, refresh and both flows together
//!
//! ## Architecture Principles
//! - Only depends on `authgate-common` and `authgate-domain`
//! - No file, socket or HTTP code
//! - All external effects via traits in [`auth::ports`]

pub mod auth;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use auth::browser_flow::{BrowserFlow, BrowserFlowOutcome};
pub use auth::device_flow::{DeviceFlow, PollBackoff};
pub use auth::ports::{
    BrowserLauncher, CallbackListener, CodeExchange, DevicePoll, EnvironmentProbe, OAuthApi,
    PendingCallback, ProgressReporter, ResourceResponse, SilentReporter, TokenStore,
};
pub use auth::service::{Authenticated, Authenticator, TokenSource};
