//! Authorization Code + PKCE flow through the system browser

use std::sync::Arc;

use async_trait::async_trait;
use authgate_common::auth::{generate_state, AuthorizationRequest, PkceParams};
use authgate_domain::constants::CALLBACK_TIMEOUT;
use authgate_domain::{AuthGateConfig, AuthGateError, FlowLabel, Result, TokenRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::{
    BrowserLauncher, CallbackListener, CodeExchange, OAuthApi, ProgressReporter, TokenStore,
};
use super::records::{persist, record_from_response};

/// How a browser flow attempt ended.
#[derive(Debug)]
pub enum BrowserFlowOutcome {
    /// Tokens obtained and persisted.
    Authorized(TokenRecord),
    /// The user is better served by the device flow.
    FallBack(AuthGateError),
    /// Hard failure to surface to the user.
    Failed(AuthGateError),
}

/// Browser flow coordinator
pub struct BrowserFlow {
    config: Arc<AuthGateConfig>,
    api: Arc<dyn OAuthApi>,
    listener: Arc<dyn CallbackListener>,
    launcher: Arc<dyn BrowserLauncher>,
    store: Arc<dyn TokenStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl BrowserFlow {
    pub fn new(
        config: Arc<AuthGateConfig>,
        api: Arc<dyn OAuthApi>,
        listener: Arc<dyn CallbackListener>,
        launcher: Arc<dyn BrowserLauncher>,
        store: Arc<dyn TokenStore>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self { config, api, listener, launcher, store, reporter }
    }

    /// Run one attempt: bind the listener, open the browser, await the
    /// callback and exchange the code in the callback handler.
    pub async fn run(&self, cancel: &CancellationToken) -> BrowserFlowOutcome {
        let state = generate_state();
        let pkce = PkceParams::generate();

        let authorize_endpoint = self.config.authorize_endpoint();
        let request = AuthorizationRequest {
            authorize_endpoint: &authorize_endpoint,
            client_id: &self.config.client_id,
            redirect_uri: &self.config.redirect_uri,
            scope: &self.config.scope,
            state: &state,
            pkce: &pkce,
        };
        let auth_url = match request.to_url() {
            Ok(url) => url,
            Err(err) => {
                return BrowserFlowOutcome::Failed(AuthGateError::Config(format!(
                    "invalid authorization URL: {err}"
                )))
            }
        };

        let exchange = Arc::new(PkceCodeExchange {
            api: Arc::clone(&self.api),
            client_id: self.config.client_id.clone(),
            verifier: pkce.verifier,
        });

        let pending =
            match self.listener.start(self.config.callback_port, state, exchange).await {
                Ok(pending) => pending,
                Err(err) => {
                    warn!(port = self.config.callback_port, error = %err, "browser_flow.listener_failed");
                    return BrowserFlowOutcome::FallBack(err);
                }
            };

        self.reporter.opening_browser(auth_url.as_str());
        if let Err(err) = self.launcher.open(auth_url.as_str()) {
            warn!(error = %err, "browser_flow.launch_failed");
            // Dropping the pending listener shuts it down.
            drop(pending);
            return BrowserFlowOutcome::FallBack(err);
        }
        info!(port = self.config.callback_port, "browser_flow.browser_opened");
        self.reporter.waiting_for_callback(CALLBACK_TIMEOUT);

        match pending.wait(cancel.clone()).await {
            Ok(record) => {
                persist(self.store.as_ref(), self.reporter.as_ref(), &record).await;
                info!(client_id = %record.client_id, "browser_flow.authorized");
                self.reporter.authorized(FlowLabel::Browser);
                BrowserFlowOutcome::Authorized(record)
            }
            Err(err) if err.is_fallback_eligible() => {
                warn!(error = %err, "browser_flow.fallback");
                BrowserFlowOutcome::FallBack(err)
            }
            Err(err) => {
                debug!(kind = err.label(), "browser_flow.failed");
                BrowserFlowOutcome::Failed(err)
            }
        }
    }
}

/// Code exchange bound to one attempt's PKCE verifier.
struct PkceCodeExchange {
    api: Arc<dyn OAuthApi>,
    client_id: String,
    verifier: String,
}

#[async_trait]
impl CodeExchange for PkceCodeExchange {
    async fn exchange(&self, code: &str) -> Result<TokenRecord> {
        let response = self.api.exchange_code(code, &self.verifier).await?;
        record_from_response(&self.client_id, response, Some(FlowLabel::Browser))
    }
}
