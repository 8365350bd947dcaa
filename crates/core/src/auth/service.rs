//! Flow selector - cached token, refresh, then browser or device flow

use std::sync::Arc;

use authgate_domain::{AuthGateConfig, AuthGateError, FlowLabel, Result, TokenRecord};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::browser_flow::{BrowserFlow, BrowserFlowOutcome};
use super::device_flow::DeviceFlow;
use super::ports::{
    BrowserLauncher, CallbackListener, EnvironmentProbe, OAuthApi, ProgressReporter,
    ResourceResponse, TokenStore,
};
use super::records::{persist, record_from_response};

const UNAUTHORIZED: u16 = 401;

/// Where the returned token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cached,
    Refreshed,
    Browser,
    Device,
}

impl From<FlowLabel> for TokenSource {
    fn from(flow: FlowLabel) -> Self {
        match flow {
            FlowLabel::Browser => Self::Browser,
            FlowLabel::Device => Self::Device,
        }
    }
}

/// A usable token and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub record: TokenRecord,
    pub source: TokenSource,
}

/// Top-level orchestration of token acquisition
pub struct Authenticator {
    config: Arc<AuthGateConfig>,
    api: Arc<dyn OAuthApi>,
    store: Arc<dyn TokenStore>,
    probe: Arc<dyn EnvironmentProbe>,
    reporter: Arc<dyn ProgressReporter>,
    browser: BrowserFlow,
    device: DeviceFlow,
}

impl Authenticator {
    pub fn new(
        config: Arc<AuthGateConfig>,
        api: Arc<dyn OAuthApi>,
        store: Arc<dyn TokenStore>,
        probe: Arc<dyn EnvironmentProbe>,
        listener: Arc<dyn CallbackListener>,
        launcher: Arc<dyn BrowserLauncher>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let browser = BrowserFlow::new(
            Arc::clone(&config),
            Arc::clone(&api),
            listener,
            launcher,
            Arc::clone(&store),
            Arc::clone(&reporter),
        );
        let device = DeviceFlow::new(
            Arc::clone(&config),
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&reporter),
        );
        Self { config, api, store, probe, reporter, browser, device }
    }

    /// Return a valid token, reusing, refreshing or acquiring one.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> Result<Authenticated> {
        let cached = match self.store.load(&self.config.client_id).await {
            Ok(record) => Some(record),
            Err(AuthGateError::NotFound(_)) => {
                debug!(client_id = %self.config.client_id, "auth.cache_miss");
                None
            }
            Err(err) => {
                warn!(error = %err, "auth.cache_unreadable");
                self.reporter.warning(&format!("ignoring unreadable token cache: {err}"));
                None
            }
        };

        if let Some(record) = cached {
            if record.is_valid_at(Utc::now()) {
                info!(client_id = %record.client_id, "auth.cache_hit");
                return Ok(Authenticated { record, source: TokenSource::Cached });
            }

            match self.refresh(&record).await {
                Ok(refreshed) => {
                    return Ok(Authenticated { record: refreshed, source: TokenSource::Refreshed });
                }
                Err(AuthGateError::RefreshTokenExpired) => {
                    info!("auth.refresh_token_expired");
                }
                Err(err) => {
                    warn!(error = %err, "auth.refresh_failed");
                }
            }
        }

        self.reauthenticate(cancel).await
    }

    /// Exchange the record's refresh token for a new access token.
    ///
    /// The previous refresh token and flow label are carried forward when the
    /// server does not rotate them.
    pub async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord> {
        let Some(refresh_token) = record.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
            return Err(AuthGateError::RefreshTokenExpired);
        };

        self.reporter.refreshing();
        let response = self.api.refresh(refresh_token).await?;
        let mut refreshed = record_from_response(&self.config.client_id, response, record.flow)?;
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.to_string());
        }

        persist(self.store.as_ref(), self.reporter.as_ref(), &refreshed).await;
        info!(client_id = %refreshed.client_id, "auth.refreshed");
        Ok(refreshed)
    }

    /// Run a fresh authorization, choosing the browser flow when feasible.
    pub async fn reauthenticate(&self, cancel: &CancellationToken) -> Result<Authenticated> {
        if self.config.force_device {
            info!("auth.device_forced");
            return self.run_device(cancel).await;
        }

        let availability = self.probe.probe(self.config.callback_port).await;
        if !availability.available {
            info!(reason = %availability.reason, "auth.browser_unavailable");
            self.reporter.browser_unavailable(&availability.reason);
            return self.run_device(cancel).await;
        }

        match self.browser.run(cancel).await {
            BrowserFlowOutcome::Authorized(record) => {
                Ok(Authenticated { record, source: TokenSource::Browser })
            }
            BrowserFlowOutcome::FallBack(reason) => {
                self.reporter.falling_back(&reason.to_string());
                self.run_device(cancel).await
            }
            BrowserFlowOutcome::Failed(err) => Err(err),
        }
    }

    async fn run_device(&self, cancel: &CancellationToken) -> Result<Authenticated> {
        let record = self.device.run(cancel).await?;
        Ok(Authenticated { record, source: TokenSource::Device })
    }

    /// Verify a token against the server's token info endpoint.
    pub async fn verify(&self, record: &TokenRecord) -> Result<String> {
        self.api.token_info(&record.access_token).await
    }

    /// Call the protected resource, refreshing once on `401`.
    ///
    /// An expired refresh token during that retry triggers a full
    /// re-authentication followed by one more attempt. The returned record is
    /// the one the final attempt used.
    pub async fn call_resource(
        &self,
        record: TokenRecord,
        cancel: &CancellationToken,
    ) -> Result<(ResourceResponse, TokenRecord)> {
        let response = self.api.fetch_resource(&record.access_token).await?;
        if response.status != UNAUTHORIZED {
            return Ok((response, record));
        }

        info!("auth.resource_unauthorized");
        let record = match self.refresh(&record).await {
            Ok(refreshed) => refreshed,
            Err(AuthGateError::RefreshTokenExpired) => {
                info!("auth.refresh_token_expired");
                self.reauthenticate(cancel).await?.record
            }
            Err(err) => return Err(err),
        };

        let response = self.api.fetch_resource(&record.access_token).await?;
        Ok((response, record))
    }
}
