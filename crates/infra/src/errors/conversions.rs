//! Conversions from external infrastructure errors into domain errors.

use std::io::{Error as IoError, ErrorKind};

use authgate_domain::AuthGateError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthGateError);

impl From<InfraError> for AuthGateError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthGateError> for InfraError {
    fn from(value: AuthGateError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAuthGateError {
    fn into_authgate(self) -> AuthGateError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthGateError */
/* -------------------------------------------------------------------------- */

impl IntoAuthGateError for HttpError {
    fn into_authgate(self) -> AuthGateError {
        if self.is_timeout() {
            return AuthGateError::Transport("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AuthGateError::Transport(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() {
            return AuthGateError::Parse(format!("failed to decode HTTP response: {self}"));
        }

        if let Some(status) = self.status() {
            return AuthGateError::Transport(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        AuthGateError::Transport(format!("HTTP request failed: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_authgate())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AuthGateError */
/* -------------------------------------------------------------------------- */

impl IntoAuthGateError for IoError {
    fn into_authgate(self) -> AuthGateError {
        match self.kind() {
            ErrorKind::NotFound => AuthGateError::NotFound(self.to_string()),
            ErrorKind::PermissionDenied => {
                AuthGateError::Storage(format!("permission denied: {self}"))
            }
            _ => AuthGateError::Storage(self.to_string()),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_authgate())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → AuthGateError */
/* -------------------------------------------------------------------------- */

impl IntoAuthGateError for JsonError {
    fn into_authgate(self) -> AuthGateError {
        if self.is_io() {
            AuthGateError::Storage(self.to_string())
        } else {
            AuthGateError::Parse(self.to_string())
        }
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_authgate())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
