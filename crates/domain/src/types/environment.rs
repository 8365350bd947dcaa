//! Browser availability as reported by the environment probe

use serde::{Deserialize, Serialize};

/// Whether the browser flow is feasible on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserAvailability {
    pub available: bool,
    /// Empty when available.
    pub reason: String,
}

impl BrowserAvailability {
    pub fn available() -> Self {
        Self { available: true, reason: String::new() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { available: false, reason: reason.into() }
    }
}
