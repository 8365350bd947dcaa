//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for AuthGate
///
/// One variant per failure kind the flows need to tell apart. Fallback and
/// re-authentication decisions match on the variant, never on the message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Error payload returned by the authorization server.
    #[error("{}", format_oauth_error(.error, .description))]
    OAuth { error: String, description: String },

    #[error("refresh token expired or invalid")]
    RefreshTokenExpired,

    #[error("browser authorization timed out after {seconds}s")]
    CallbackTimeout { seconds: u64 },

    #[error("could not open browser: {0}")]
    BrowserLaunchFailed(String),

    #[error("state parameter mismatch (possible CSRF attack)")]
    CsrfMismatch,

    #[error("invalid token response: {0}")]
    TokenValidation(String),

    #[error("device code expired, please restart the flow")]
    DeviceCodeExpired,

    #[error("user denied authorization")]
    AuthorizationDenied,

    #[error("operation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthGateError {
    /// Build an OAuth protocol error from a parsed `error`/`error_description`.
    pub fn oauth(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth { error: error.into(), description: description.into() }
    }

    /// Failures after which the device flow is still a viable path.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::BrowserLaunchFailed(_) | Self::CallbackTimeout { .. })
    }

    /// Stable label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::OAuth { .. } => "oauth_protocol",
            Self::RefreshTokenExpired => "refresh_token_expired",
            Self::CallbackTimeout { .. } => "callback_timeout",
            Self::BrowserLaunchFailed(_) => "browser_launch_failed",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::TokenValidation(_) => "token_validation",
            Self::DeviceCodeExpired => "device_code_expired",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Cancelled => "cancelled",
            Self::Storage(_) => "storage",
            Self::NotFound(_) => "not_found",
            Self::Parse(_) => "parse",
            Self::Internal(_) => "internal",
        }
    }
}

fn format_oauth_error(error: &str, description: &str) -> String {
    if description.is_empty() {
        error.to_string()
    } else {
        format!("{error}: {description}")
    }
}

/// Result type alias for AuthGate operations
pub type Result<T> = std::result::Result<T, AuthGateError>;
