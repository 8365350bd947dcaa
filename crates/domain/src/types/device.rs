//! RFC 8628 device authorization response

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_POLL_INTERVAL_SECS;

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: u64,
}

impl DeviceAuthorization {
    /// Server-suggested polling period, 5 s when absent or zero.
    pub fn poll_interval(&self) -> Duration {
        if self.interval == 0 {
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        } else {
            Duration::from_secs(self.interval)
        }
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    /// URL to show the user, preferring the one with the code embedded.
    pub fn display_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.verification_uri)
    }
}
