//! Token response to cache record conversion and best-effort persistence

use authgate_common::auth::TokenResponse;
use authgate_domain::{AuthGateError, FlowLabel, Result, TokenRecord};
use chrono::Utc;
use tracing::{debug, warn};

use super::ports::{ProgressReporter, TokenStore};

/// Validate `response` and stamp it with the receive time.
pub(crate) fn record_from_response(
    client_id: &str,
    response: TokenResponse,
    flow: Option<FlowLabel>,
) -> Result<TokenRecord> {
    let received_at = Utc::now();
    response.validate().map_err(|e| AuthGateError::TokenValidation(e.to_string()))?;

    let expires_in = response.expires_in;
    TokenRecord::from_lifetime(
        client_id,
        response.access_token,
        response.refresh_token,
        response.token_type,
        expires_in,
        received_at,
        flow,
    )
    .ok_or_else(|| {
        AuthGateError::TokenValidation(format!("expires_in {expires_in} is out of range"))
    })
}

/// Save `record`; failures are reported as warnings and swallowed.
pub(crate) async fn persist(
    store: &dyn TokenStore,
    reporter: &dyn ProgressReporter,
    record: &TokenRecord,
) {
    match store.save(record).await {
        Ok(()) => debug!(client_id = %record.client_id, "token_store.saved"),
        Err(err) => {
            warn!(client_id = %record.client_id, error = %err, "token_store.save_failed");
            reporter.warning(&format!("failed to save tokens: {err}"));
        }
    }
}
