//! Immutable client configuration
//!
//! Resolved once at startup and handed to every component by value or `Arc`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTHORIZE_PATH, CALLBACK_PATH, DEFAULT_CALLBACK_PORT, DEFAULT_SCOPE, DEFAULT_SERVER_URL,
    DEFAULT_TOKEN_FILE, DEVICE_CODE_PATH, TOKEN_INFO_PATH, TOKEN_PATH,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGateConfig {
    /// Base URL without a trailing slash.
    pub server_url: String,
    pub client_id: String,
    /// `None` selects public-client (PKCE only) mode.
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub callback_port: u16,
    pub scope: String,
    pub token_file: PathBuf,
    pub force_device: bool,
}

impl AuthGateConfig {
    /// Configuration with defaults for everything except the client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: default_redirect_uri(DEFAULT_CALLBACK_PORT),
            callback_port: DEFAULT_CALLBACK_PORT,
            scope: DEFAULT_SCOPE.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            force_device: false,
        }
    }

    pub fn is_public_client(&self) -> bool {
        self.client_secret.as_deref().map_or(true, str::is_empty)
    }

    /// Secret to send, only for confidential clients.
    pub fn confidential_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }

    pub fn client_mode(&self) -> &'static str {
        if self.is_public_client() {
            "public (PKCE)"
        } else {
            "confidential"
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    pub fn token_endpoint(&self) -> String {
        self.endpoint(TOKEN_PATH)
    }

    pub fn device_code_endpoint(&self) -> String {
        self.endpoint(DEVICE_CODE_PATH)
    }

    pub fn token_info_endpoint(&self) -> String {
        self.endpoint(TOKEN_INFO_PATH)
    }

    pub fn authorize_endpoint(&self) -> String {
        self.endpoint(AUTHORIZE_PATH)
    }
}

/// `http://localhost:{port}/callback`
pub fn default_redirect_uri(port: u16) -> String {
    format!("http://localhost:{port}{CALLBACK_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_public_client() {
        let config = AuthGateConfig::new("cli");
        assert!(config.is_public_client());
        assert_eq!(config.client_mode(), "public (PKCE)");
        assert_eq!(config.redirect_uri, "http://localhost:8888/callback");
        assert_eq!(config.scope, "read write");
        assert!(!config.force_device);
    }

    #[test]
    fn empty_secret_is_still_public() {
        let mut config = AuthGateConfig::new("cli");
        config.client_secret = Some(String::new());
        assert!(config.is_public_client());
        assert_eq!(config.confidential_secret(), None);

        config.client_secret = Some("s3cret".into());
        assert!(!config.is_public_client());
        assert_eq!(config.confidential_secret(), Some("s3cret"));
        assert_eq!(config.client_mode(), "confidential");
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let mut config = AuthGateConfig::new("cli");
        config.server_url = "https://auth.example.com/".into();
        assert_eq!(config.token_endpoint(), "https://auth.example.com/oauth/token");
        assert_eq!(config.device_code_endpoint(), "https://auth.example.com/oauth/device/code");
        assert_eq!(config.token_info_endpoint(), "https://auth.example.com/oauth/tokeninfo");
        assert_eq!(config.authorize_endpoint(), "https://auth.example.com/oauth/authorize");
    }
}
