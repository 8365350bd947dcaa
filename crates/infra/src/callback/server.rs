//! Single-shot axum server on `127.0.0.1:<port>`
//!
//! The first `/callback` request claims the result sender; it is the only
//! request that can decide the outcome. The code exchange runs inside that
//! request so the page shown in the browser reflects the final result. Later
//! requests get a page but never a second delivery. Every request is bounded
//! by the I/O timeout; a request that overruns it gets `408`.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate_common::auth::validate_state;
use authgate_core::{CallbackListener, CodeExchange, PendingCallback};
use authgate_domain::constants::{
    CALLBACK_IO_TIMEOUT, CALLBACK_PATH, CALLBACK_TIMEOUT, LISTENER_SHUTDOWN_GRACE,
};
use authgate_domain::{AuthGateError, Result, TokenRecord};
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pages::{already_handled_page, failure_page, success_page};

type CallbackResult = Result<TokenRecord>;

/// [`CallbackListener`] serving the loopback redirect
#[derive(Debug, Clone)]
pub struct LoopbackCallbackListener {
    timeout: Duration,
    io_timeout: Duration,
}

impl Default for LoopbackCallbackListener {
    fn default() -> Self {
        Self { timeout: CALLBACK_TIMEOUT, io_timeout: CALLBACK_IO_TIMEOUT }
    }
}

impl LoopbackCallbackListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bounded wait, mainly for tests.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }

    /// Override the per-request bound.
    pub fn io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Bind and start serving. Port `0` picks an ephemeral port.
    pub async fn bind(
        &self,
        port: u16,
        expected_state: String,
        exchange: Arc<dyn CodeExchange>,
    ) -> Result<RunningCallback> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|err| {
            AuthGateError::Transport(format!("callback port {port} unavailable: {err}"))
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            AuthGateError::Transport(format!("failed to determine callback address: {err}"))
        })?;

        let (result_tx, result_rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected_state,
            exchange,
            result_tx: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(state)
            .layer(middleware::from_fn_with_state(self.io_timeout, bound_request));

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
            {
                error!(error = %err, "callback.server_error");
            }
        });

        info!(addr = %local_addr, "callback.listener_bound");
        Ok(RunningCallback {
            local_addr,
            timeout: self.timeout,
            result_rx: Some(result_rx),
            shutdown,
            handle: Some(handle),
        })
    }
}

#[async_trait]
impl CallbackListener for LoopbackCallbackListener {
    async fn start(
        &self,
        port: u16,
        expected_state: String,
        exchange: Arc<dyn CodeExchange>,
    ) -> Result<Box<dyn PendingCallback>> {
        let running = self.bind(port, expected_state, exchange).await?;
        Ok(Box::new(running))
    }
}

/// A bound listener waiting for its one callback
pub struct RunningCallback {
    local_addr: SocketAddr,
    timeout: Duration,
    result_rx: Option<oneshot::Receiver<CallbackResult>>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RunningCallback {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the outcome, then stop the server.
    pub async fn wait_for_result(mut self, cancel: CancellationToken) -> CallbackResult {
        let outcome = match self.result_rx.take() {
            Some(result_rx) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(AuthGateError::Cancelled),
                    received = result_rx => received.unwrap_or_else(|_| {
                        Err(AuthGateError::Internal("callback listener stopped without a result".into()))
                    }),
                    () = tokio::time::sleep(self.timeout) => {
                        warn!(timeout_secs = self.timeout.as_secs(), "callback.timeout");
                        Err(AuthGateError::CallbackTimeout { seconds: self.timeout.as_secs() })
                    }
                }
            }
            None => Err(AuthGateError::Internal("callback result already consumed".into())),
        };

        self.shutdown().await;
        outcome
    }

    /// Stop accepting connections; abort after the grace period.
    async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(LISTENER_SHUTDOWN_GRACE, &mut handle).await {
                Ok(Err(err)) if err.is_panic() => error!(error = %err, "callback.server_panicked"),
                Ok(_) => debug!(addr = %self.local_addr, "callback.listener_closed"),
                Err(_) => {
                    warn!(addr = %self.local_addr, "callback.shutdown_grace_exceeded");
                    handle.abort();
                }
            }
        }
    }
}

#[async_trait]
impl PendingCallback for RunningCallback {
    async fn wait(self: Box<Self>, cancel: CancellationToken) -> CallbackResult {
        (*self).wait_for_result(cancel).await
    }
}

impl Drop for RunningCallback {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

struct CallbackState {
    expected_state: String,
    exchange: Arc<dyn CodeExchange>,
    result_tx: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

async fn bound_request(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                "callback.request_timeout"
            );
            (StatusCode::REQUEST_TIMEOUT, Html(failure_page("the request timed out"))).into_response()
        }
    }
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let Some(result_tx) = state.result_tx.lock().take() else {
        debug!("callback.duplicate_request");
        return (StatusCode::CONFLICT, Html(already_handled_page()));
    };

    // Detached so a dropped browser connection cannot abort the exchange
    // or lose the result.
    let task = tokio::spawn(async move {
        let outcome = evaluate(&state, &params).await;
        let page = match &outcome {
            Ok(_) => (StatusCode::OK, Html(success_page())),
            Err(err) => (StatusCode::BAD_REQUEST, Html(failure_page(&err.to_string()))),
        };
        if result_tx.send(outcome).is_err() {
            debug!("callback.result_unclaimed");
        }
        page
    });

    match task.await {
        Ok(page) => page,
        Err(err) => {
            error!(error = %err, "callback.handler_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(failure_page("internal error")))
        }
    }
}

async fn evaluate(state: &CallbackState, params: &HashMap<String, String>) -> CallbackResult {
    if let Some(error) = param(params, "error") {
        let description = param(params, "error_description").unwrap_or_default();
        warn!(error, "callback.authorization_error");
        return Err(AuthGateError::oauth(error, description));
    }

    if !validate_state(&state.expected_state, param(params, "state").unwrap_or_default()) {
        warn!("callback.state_mismatch");
        return Err(AuthGateError::CsrfMismatch);
    }

    let Some(code) = param(params, "code") else {
        warn!("callback.missing_code");
        return Err(AuthGateError::oauth("missing_code", "no authorization code received"));
    };

    match tokio::time::timeout(CALLBACK_IO_TIMEOUT, state.exchange.exchange(code)).await {
        Ok(result) => {
            if result.is_ok() {
                info!("callback.code_exchanged");
            }
            result
        }
        Err(_) => Err(AuthGateError::Transport(format!(
            "token exchange did not finish within {}s",
            CALLBACK_IO_TIMEOUT.as_secs()
        ))),
    }
}
