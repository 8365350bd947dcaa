//! Port interfaces for token acquisition
//!
//! These traits define the boundaries between the flows and the
//! infrastructure that talks to the network, the filesystem and the user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate_common::auth::TokenResponse;
use authgate_domain::{BrowserAvailability, DeviceAuthorization, FlowLabel, Result, TokenRecord};
use tokio_util::sync::CancellationToken;

/// Persistent multi-client token cache
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the record for `client_id`.
    ///
    /// Fails with `AuthGateError::NotFound` when the file, the mapping or the
    /// key is missing, and with `AuthGateError::Parse` when the file is corrupt.
    async fn load(&self, client_id: &str) -> Result<TokenRecord>;

    /// Insert or replace the record under `record.client_id`.
    async fn save(&self, record: &TokenRecord) -> Result<()>;
}

/// Result of a single device token poll.
#[derive(Debug, Clone)]
pub enum DevicePoll {
    Granted(TokenResponse),
    Pending,
    SlowDown,
    Expired,
    Denied,
    Failed { error: String, description: String },
}

/// Response of a protected resource call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: u16,
    pub body: String,
}

/// OAuth endpoints of the authorization server
///
/// Implementations own the client credentials and per-request deadlines.
#[async_trait]
pub trait OAuthApi: Send + Sync {
    /// `grant_type=authorization_code` exchange. `code_verifier` is always sent.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse>;

    /// `grant_type=refresh_token`.
    ///
    /// `invalid_grant` and `invalid_token` map to
    /// `AuthGateError::RefreshTokenExpired`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// RFC 8628 §3.1 device authorization request.
    async fn request_device_code(&self) -> Result<DeviceAuthorization>;

    /// RFC 8628 §3.4 device access token request.
    async fn poll_device_token(&self, device_code: &str) -> Result<DevicePoll>;

    /// Token introspection body from `/oauth/tokeninfo`.
    async fn token_info(&self, access_token: &str) -> Result<String>;

    /// Authenticated GET against the demo resource.
    async fn fetch_resource(&self, access_token: &str) -> Result<ResourceResponse>;
}

/// Turns an authorization code into a token record.
///
/// Invoked by the callback listener from inside its request handler.
#[async_trait]
pub trait CodeExchange: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<TokenRecord>;
}

/// Loopback receiver for the authorization redirect
#[async_trait]
pub trait CallbackListener: Send + Sync {
    /// Bind `127.0.0.1:<port>` and start serving.
    ///
    /// Returns once the socket is listening, so the browser can be launched
    /// without racing the redirect.
    async fn start(
        &self,
        port: u16,
        expected_state: String,
        exchange: Arc<dyn CodeExchange>,
    ) -> Result<Box<dyn PendingCallback>>;
}

/// A running single-shot listener
#[async_trait]
pub trait PendingCallback: Send {
    /// Wait for the one callback outcome, the listener timeout, or `cancel`.
    ///
    /// The listener is shut down before this returns.
    async fn wait(self: Box<Self>, cancel: CancellationToken) -> Result<TokenRecord>;
}

/// Opens URLs in the user's browser
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Decides whether the browser flow is feasible
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    async fn probe(&self, callback_port: u16) -> BrowserAvailability;
}

/// User-facing progress output
///
/// Every method defaults to a no-op; the binary renders them on the terminal.
pub trait ProgressReporter: Send + Sync {
    fn browser_unavailable(&self, _reason: &str) {}
    fn opening_browser(&self, _url: &str) {}
    fn waiting_for_callback(&self, _timeout: Duration) {}
    fn falling_back(&self, _reason: &str) {}
    fn device_code(&self, _authorization: &DeviceAuthorization) {}
    fn poll_tick(&self) {}
    fn slowed_down(&self, _interval: Duration) {}
    fn authorized(&self, _flow: FlowLabel) {}
    fn refreshing(&self) {}
    fn warning(&self, _message: &str) {}
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
