//! OAuth 2.0 token endpoint wire types
//!
//! Deserializes RFC 6749 §5.1 success bodies and §5.2 error bodies, and
//! enforces the minimum shape we accept before caching a token.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum accepted access token length.
pub const MIN_ACCESS_TOKEN_LENGTH: usize = 10;

/// The only non-empty `token_type` accepted.
pub const BEARER: &str = "Bearer";

/// Successful token endpoint response
///
/// Missing optional fields deserialize to their defaults so that
/// [`TokenResponse::validate`] can report precisely what is wrong.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Check the response is usable.
    ///
    /// # Errors
    /// Returns the first violated constraint: empty or short access token,
    /// non-positive lifetime, or a token type other than `Bearer`.
    pub fn validate(&self) -> Result<(), TokenValidationError> {
        if self.access_token.is_empty() {
            return Err(TokenValidationError::EmptyAccessToken);
        }
        if self.access_token.len() < MIN_ACCESS_TOKEN_LENGTH {
            return Err(TokenValidationError::AccessTokenTooShort(self.access_token.len()));
        }
        if self.expires_in <= 0 {
            return Err(TokenValidationError::NonPositiveExpiry(self.expires_in));
        }
        if !self.token_type.is_empty() && self.token_type != BEARER {
            return Err(TokenValidationError::UnexpectedTokenType(self.token_type.clone()));
        }
        Ok(())
    }

    /// Refresh token if the server sent a non-empty one.
    #[must_use]
    pub fn issued_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Reasons a token response is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenValidationError {
    #[error("access_token is empty")]
    EmptyAccessToken,

    #[error("access_token is too short (length: {0})")]
    AccessTokenTooShort(usize),

    #[error("expires_in must be positive, got: {0}")]
    NonPositiveExpiry(i64),

    #[error("unexpected token_type: {0} (expected Bearer)")]
    UnexpectedTokenType(String),
}

/// OAuth error response from the authorization server (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Parse a body as an OAuth error, ignoring bodies without `error`.
    #[must_use]
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body).ok().filter(|e| !e.error.is_empty())
    }

    #[must_use]
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for OAuthErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_description.as_deref().filter(|d| !d.is_empty()) {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    fn response(access_token: &str, token_type: &str, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access_token.to_string(),
            token_type: token_type.to_string(),
            expires_in,
            ..TokenResponse::default()
        }
    }

    /// Validates `TokenResponse::validate` for the accepted shapes.
    ///
    /// Assertions:
    /// - Accepts a Bearer token with a positive lifetime.
    /// - Accepts an empty token type.
    #[test]
    fn test_valid_responses() {
        assert_eq!(response("AAAAAAAAAAAAAAAA", "Bearer", 3600).validate(), Ok(()));
        assert_eq!(response("AAAAAAAAAA", "", 1).validate(), Ok(()));
    }

    /// Validates `TokenResponse::validate` rejection reasons and messages.
    ///
    /// Assertions:
    /// - Each violated rule maps to its own error variant and message.
    #[test]
    fn test_invalid_responses() {
        assert_eq!(
            response("", "Bearer", 3600).validate(),
            Err(TokenValidationError::EmptyAccessToken)
        );

        let short = response("short", "Bearer", 3600).validate().unwrap_err();
        assert_eq!(short.to_string(), "access_token is too short (length: 5)");

        let expiry = response("AAAAAAAAAAAA", "Bearer", 0).validate().unwrap_err();
        assert_eq!(expiry.to_string(), "expires_in must be positive, got: 0");

        let kind = response("AAAAAAAAAAAA", "mac", 60).validate().unwrap_err();
        assert_eq!(kind.to_string(), "unexpected token_type: mac (expected Bearer)");
    }

    #[test]
    fn test_token_type_is_case_sensitive() {
        assert!(response("AAAAAAAAAAAA", "bearer", 60).validate().is_err());
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(parsed.expires_in, 0);
        assert!(parsed.token_type.is_empty());
        assert!(parsed.issued_refresh_token().is_none());
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_empty_refresh_token_is_not_issued() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"AAAAAAAAAAAA","refresh_token":"","expires_in":60}"#)
                .unwrap();
        assert!(parsed.issued_refresh_token().is_none());
    }

    #[test]
    fn test_oauth_error_display() {
        let full = OAuthErrorResponse::from_body(
            r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
        )
        .unwrap();
        assert_eq!(full.to_string(), "invalid_grant: refresh token revoked");

        let bare = OAuthErrorResponse::from_body(r#"{"error":"slow_down"}"#).unwrap();
        assert_eq!(bare.to_string(), "slow_down");
        assert_eq!(bare.description(), "");

        assert!(OAuthErrorResponse::from_body("<html>bad gateway</html>").is_none());
        assert!(OAuthErrorResponse::from_body(r#"{"error":""}"#).is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let mut token = response("super-secret-access", "Bearer", 60);
        token.refresh_token = Some("super-secret-refresh".into());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
