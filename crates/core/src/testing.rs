//! In-memory doubles for every port
//!
//! Scripted responses are consumed in order; calls are recorded for
//! assertions. Available to other crates through the `test-utils` feature.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate_common::auth::{validate_state, TokenResponse};
use authgate_domain::constants::CALLBACK_TIMEOUT;
use authgate_domain::{
    AuthGateError, BrowserAvailability, DeviceAuthorization, FlowLabel, Result, TokenRecord,
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth::ports::{
    BrowserLauncher, CallbackListener, CodeExchange, DevicePoll, EnvironmentProbe, OAuthApi,
    PendingCallback, ProgressReporter, ResourceResponse, TokenStore,
};

fn unscripted(call: &str) -> AuthGateError {
    AuthGateError::Internal(format!("no scripted response for {call}"))
}

// ============================================================================
// Token store
// ============================================================================

/// Token store backed by a `HashMap`
#[derive(Default)]
pub struct MockTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
    fail_saves: Mutex<bool>,
    load_error: Mutex<Option<AuthGateError>>,
    saves: Mutex<usize>,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        let store = Self::new();
        store.insert(record);
        store
    }

    pub fn insert(&self, record: TokenRecord) {
        self.records.lock().insert(record.client_id.clone(), record);
    }

    pub fn get(&self, client_id: &str) -> Option<TokenRecord> {
        self.records.lock().get(client_id).cloned()
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    pub fn fail_loads_with(&self, err: AuthGateError) {
        *self.load_error.lock() = Some(err);
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn load(&self, client_id: &str) -> Result<TokenRecord> {
        if let Some(err) = self.load_error.lock().clone() {
            return Err(err);
        }
        self.get(client_id)
            .ok_or_else(|| AuthGateError::NotFound(format!("no token for client {client_id}")))
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.saves.lock() += 1;
        if *self.fail_saves.lock() {
            return Err(AuthGateError::Storage("disk full".into()));
        }
        self.insert(record.clone());
        Ok(())
    }
}

// ============================================================================
// OAuth API
// ============================================================================

/// Scripted authorization server
#[derive(Default)]
pub struct MockOAuthApi {
    exchanges: Mutex<VecDeque<Result<TokenResponse>>>,
    refreshes: Mutex<VecDeque<Result<TokenResponse>>>,
    device_codes: Mutex<VecDeque<Result<DeviceAuthorization>>>,
    polls: Mutex<VecDeque<Result<DevicePoll>>>,
    resources: Mutex<VecDeque<Result<ResourceResponse>>>,
    token_infos: Mutex<VecDeque<Result<String>>>,
    pending_when_empty: Mutex<bool>,

    exchange_calls: Mutex<Vec<(String, String)>>,
    refresh_calls: Mutex<Vec<String>>,
    resource_tokens: Mutex<Vec<String>>,
    poll_times: Mutex<Vec<Instant>>,
}

impl MockOAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token response.
    pub fn token(access_token: String, refresh_token: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token,
            refresh_token: refresh_token.map(str::to_string),
            token_type: "Bearer".into(),
            expires_in,
            scope: Some("read write".into()),
        }
    }

    pub fn device_code(interval: u64, expires_in: u64) -> DeviceAuthorization {
        DeviceAuthorization {
            device_code: "device-code-1".into(),
            user_code: "ABCD-EFGH".into(),
            verification_uri: "http://localhost:8080/device".into(),
            verification_uri_complete: Some("http://localhost:8080/device?user_code=ABCD-EFGH".into()),
            expires_in,
            interval,
        }
    }

    pub fn push_exchange(&self, response: Result<TokenResponse>) {
        self.exchanges.lock().push_back(response);
    }

    pub fn push_refresh(&self, response: Result<TokenResponse>) {
        self.refreshes.lock().push_back(response);
    }

    pub fn push_device_code(&self, response: Result<DeviceAuthorization>) {
        self.device_codes.lock().push_back(response);
    }

    pub fn push_poll(&self, response: Result<DevicePoll>) {
        self.polls.lock().push_back(response);
    }

    pub fn push_resource(&self, response: Result<ResourceResponse>) {
        self.resources.lock().push_back(response);
    }

    pub fn push_token_info(&self, response: Result<String>) {
        self.token_infos.lock().push_back(response);
    }

    /// Answer `authorization_pending` once the poll script is exhausted.
    pub fn keep_pending(&self) {
        *self.pending_when_empty.lock() = true;
    }

    /// `(code, code_verifier)` per exchange.
    pub fn exchange_calls(&self) -> Vec<(String, String)> {
        self.exchange_calls.lock().clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.refresh_calls.lock().clone()
    }

    pub fn resource_tokens(&self) -> Vec<String> {
        self.resource_tokens.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_times.lock().len().saturating_sub(1)
    }

    /// Time between the device code response and each poll, then between
    /// consecutive polls.
    pub fn poll_gaps(&self) -> Vec<Duration> {
        self.poll_times.lock().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl OAuthApi for MockOAuthApi {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        self.exchange_calls.lock().push((code.to_string(), code_verifier.to_string()));
        self.exchanges.lock().pop_front().unwrap_or_else(|| Err(unscripted("exchange_code")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.refresh_calls.lock().push(refresh_token.to_string());
        self.refreshes.lock().pop_front().unwrap_or_else(|| Err(unscripted("refresh")))
    }

    async fn request_device_code(&self) -> Result<DeviceAuthorization> {
        self.poll_times.lock().push(Instant::now());
        self.device_codes.lock().pop_front().unwrap_or_else(|| Err(unscripted("request_device_code")))
    }

    async fn poll_device_token(&self, _device_code: &str) -> Result<DevicePoll> {
        self.poll_times.lock().push(Instant::now());
        let next = self.polls.lock().pop_front();
        match next {
            Some(response) => response,
            None if *self.pending_when_empty.lock() => Ok(DevicePoll::Pending),
            None => Err(unscripted("poll_device_token")),
        }
    }

    async fn token_info(&self, _access_token: &str) -> Result<String> {
        self.token_infos.lock().pop_front().unwrap_or_else(|| Err(unscripted("token_info")))
    }

    async fn fetch_resource(&self, access_token: &str) -> Result<ResourceResponse> {
        self.resource_tokens.lock().push(access_token.to_string());
        self.resources.lock().pop_front().unwrap_or_else(|| Err(unscripted("fetch_resource")))
    }
}

// ============================================================================
// Callback listener
// ============================================================================

/// What the fake browser redirect delivers.
#[derive(Debug, Clone)]
pub enum CallbackScript {
    /// Correct state with this code.
    Code(String),
    /// Explicit state, which may not match.
    State { state: String, code: String },
    /// Authorization server redirected with an error.
    Error { error: String, description: String },
    /// No callback before the listener timeout.
    Timeout,
    /// The port cannot be bound.
    BindError,
}

/// Listener that replays a [`CallbackScript`] instead of serving HTTP
pub struct MockCallbackListener {
    script: CallbackScript,
    expected_state: Mutex<Option<String>>,
}

impl MockCallbackListener {
    pub fn new(script: CallbackScript) -> Self {
        Self { script, expected_state: Mutex::new(None) }
    }

    pub fn expected_state(&self) -> Option<String> {
        self.expected_state.lock().clone()
    }
}

#[async_trait]
impl CallbackListener for MockCallbackListener {
    async fn start(
        &self,
        port: u16,
        expected_state: String,
        exchange: Arc<dyn CodeExchange>,
    ) -> Result<Box<dyn PendingCallback>> {
        if matches!(self.script, CallbackScript::BindError) {
            return Err(AuthGateError::Transport(format!("callback port {port} unavailable")));
        }
        *self.expected_state.lock() = Some(expected_state.clone());
        Ok(Box::new(ScriptedCallback { script: self.script.clone(), expected_state, exchange }))
    }
}

struct ScriptedCallback {
    script: CallbackScript,
    expected_state: String,
    exchange: Arc<dyn CodeExchange>,
}

#[async_trait]
impl PendingCallback for ScriptedCallback {
    async fn wait(self: Box<Self>, cancel: CancellationToken) -> Result<TokenRecord> {
        if cancel.is_cancelled() {
            return Err(AuthGateError::Cancelled);
        }
        let Self { script, expected_state, exchange } = *self;
        match script {
            CallbackScript::Code(code) => exchange.exchange(&code).await,
            CallbackScript::State { state, code } => {
                if validate_state(&expected_state, &state) {
                    exchange.exchange(&code).await
                } else {
                    Err(AuthGateError::CsrfMismatch)
                }
            }
            CallbackScript::Error { error, description } => {
                Err(AuthGateError::OAuth { error, description })
            }
            CallbackScript::Timeout => {
                Err(AuthGateError::CallbackTimeout { seconds: CALLBACK_TIMEOUT.as_secs() })
            }
            CallbackScript::BindError => Err(unscripted("wait after bind error")),
        }
    }
}

// ============================================================================
// Browser, probe, reporter
// ============================================================================

/// Records opened URLs; optionally fails
#[derive(Default)]
pub struct MockBrowserLauncher {
    opened: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl MockBrowserLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl BrowserLauncher for MockBrowserLauncher {
    fn open(&self, url: &str) -> Result<()> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(AuthGateError::BrowserLaunchFailed(message));
        }
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Probe with a fixed answer
pub struct FixedProbe {
    availability: BrowserAvailability,
    probes: Mutex<Vec<u16>>,
}

impl FixedProbe {
    pub fn available() -> Self {
        Self { availability: BrowserAvailability::available(), probes: Mutex::new(Vec::new()) }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            availability: BrowserAvailability::unavailable(reason),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn probed_ports(&self) -> Vec<u16> {
        self.probes.lock().clone()
    }
}

#[async_trait]
impl EnvironmentProbe for FixedProbe {
    async fn probe(&self, callback_port: u16) -> BrowserAvailability {
        self.probes.lock().push(callback_port);
        self.availability.clone()
    }
}

/// Reporter that keeps every event as a short string
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
    ticks: Mutex<usize>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn ticks(&self) -> usize {
        *self.ticks.lock()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl ProgressReporter for RecordingReporter {
    fn browser_unavailable(&self, reason: &str) {
        self.push(format!("browser_unavailable: {reason}"));
    }

    fn opening_browser(&self, _url: &str) {
        self.push("opening_browser".into());
    }

    fn falling_back(&self, reason: &str) {
        self.push(format!("falling_back: {reason}"));
    }

    fn device_code(&self, authorization: &DeviceAuthorization) {
        self.push(format!("device_code: {}", authorization.user_code));
    }

    fn poll_tick(&self) {
        *self.ticks.lock() += 1;
    }

    fn slowed_down(&self, interval: Duration) {
        self.push(format!("slowed_down: {}ms", interval.as_millis()));
    }

    fn authorized(&self, flow: FlowLabel) {
        self.push(format!("authorized: {flow}"));
    }

    fn refreshing(&self) {
        self.push("refreshing".into());
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning: {message}"));
    }
}
