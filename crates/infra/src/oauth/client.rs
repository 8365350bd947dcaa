//! Form-encoded calls against the authorization server endpoints
//!
//! Implements [`OAuthApi`] over [`HttpClient`]. Each call carries its own
//! 10 second deadline; `client_secret` is only sent by confidential clients.

use std::sync::Arc;

use async_trait::async_trait;
use authgate_common::auth::{OAuthErrorResponse, TokenResponse};
use authgate_core::{DevicePoll, OAuthApi, ResourceResponse};
use authgate_domain::constants::{
    GRANT_AUTHORIZATION_CODE, GRANT_DEVICE_CODE, GRANT_REFRESH_TOKEN, OAUTH_REQUEST_TIMEOUT,
};
use authgate_domain::{AuthGateConfig, AuthGateError, DeviceAuthorization, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::InfraError;
use crate::http::HttpClient;

/// OAuth errors that mean the refresh token is no longer usable.
const REFRESH_REJECTIONS: [&str; 2] = ["invalid_grant", "invalid_token"];

/// [`OAuthApi`] backed by the retrying HTTP transport
pub struct HttpOAuthApi {
    config: Arc<AuthGateConfig>,
    http: HttpClient,
}

impl HttpOAuthApi {
    pub fn new(config: Arc<AuthGateConfig>, http: HttpClient) -> Self {
        Self { config, http }
    }

    async fn post_form(&self, url: String, form: &[(&str, &str)]) -> Result<(StatusCode, String)> {
        let builder = self.http.request(Method::POST, url).form(form);
        let response = self.http.send(builder, OAUTH_REQUEST_TIMEOUT).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| AuthGateError::from(InfraError::from(e)))?;
        Ok((status, body))
    }

    async fn get_bearer(&self, url: String, access_token: &str) -> Result<(StatusCode, String)> {
        let builder = self
            .http
            .request(Method::GET, url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        let response = self.http.send(builder, OAUTH_REQUEST_TIMEOUT).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| AuthGateError::from(InfraError::from(e)))?;
        Ok((status, body))
    }

    fn with_secret<'a>(&'a self, form: &mut Vec<(&'static str, &'a str)>) {
        if let Some(secret) = self.config.confidential_secret() {
            form.push(("client_secret", secret));
        }
    }
}

fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| AuthGateError::Parse(format!("failed to parse {what}: {e}")))
}

/// Map a non-success response to the OAuth error it carries, or a transport
/// error citing the status when the body is not an OAuth error document.
fn error_from_response(status: StatusCode, body: &str) -> AuthGateError {
    match OAuthErrorResponse::from_body(body) {
        Some(err) => AuthGateError::OAuth {
            error: err.error.clone(),
            description: err.description().to_string(),
        },
        None => AuthGateError::Transport(format!("status {}: {}", status.as_u16(), body.trim())),
    }
}

#[async_trait]
impl OAuthApi for HttpOAuthApi {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", GRANT_AUTHORIZATION_CODE),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        self.with_secret(&mut form);

        let (status, body) = self.post_form(self.config.token_endpoint(), &form).await?;
        if status != StatusCode::OK {
            let err = error_from_response(status, &body);
            warn!(status = status.as_u16(), kind = err.label(), "oauth.code_exchange_failed");
            return Err(err);
        }
        debug!("oauth.code_exchanged");
        parse_json(&body, "token response")
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", GRANT_REFRESH_TOKEN),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.with_secret(&mut form);

        let (status, body) = self.post_form(self.config.token_endpoint(), &form).await?;
        if status != StatusCode::OK {
            if let Some(err) = OAuthErrorResponse::from_body(&body) {
                if REFRESH_REJECTIONS.contains(&err.error.as_str()) {
                    debug!(error = %err.error, "oauth.refresh_rejected");
                    return Err(AuthGateError::RefreshTokenExpired);
                }
            }
            let err = error_from_response(status, &body);
            warn!(status = status.as_u16(), kind = err.label(), "oauth.refresh_failed");
            return Err(err);
        }
        parse_json(&body, "token response")
    }

    async fn request_device_code(&self) -> Result<DeviceAuthorization> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        let (status, body) = self.post_form(self.config.device_code_endpoint(), &form).await?;
        if status != StatusCode::OK {
            return Err(error_from_response(status, &body));
        }
        parse_json(&body, "device code response")
    }

    async fn poll_device_token(&self, device_code: &str) -> Result<DevicePoll> {
        let form = [
            ("grant_type", GRANT_DEVICE_CODE),
            ("device_code", device_code),
            ("client_id", self.config.client_id.as_str()),
        ];
        let (status, body) = self.post_form(self.config.token_endpoint(), &form).await?;
        if status == StatusCode::OK {
            return parse_json(&body, "token response").map(DevicePoll::Granted);
        }

        let Some(err) = OAuthErrorResponse::from_body(&body) else {
            return Err(AuthGateError::Transport(format!(
                "status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        };
        Ok(match err.error.as_str() {
            "authorization_pending" => DevicePoll::Pending,
            "slow_down" => DevicePoll::SlowDown,
            "expired_token" => DevicePoll::Expired,
            "access_denied" => DevicePoll::Denied,
            _ => DevicePoll::Failed { description: err.description().to_string(), error: err.error },
        })
    }

    async fn token_info(&self, access_token: &str) -> Result<String> {
        let (status, body) = self.get_bearer(self.config.token_info_endpoint(), access_token).await?;
        if status != StatusCode::OK {
            return Err(error_from_response(status, &body));
        }
        Ok(body)
    }

    async fn fetch_resource(&self, access_token: &str) -> Result<ResourceResponse> {
        let (status, body) = self.get_bearer(self.config.token_info_endpoint(), access_token).await?;
        Ok(ResourceResponse { status: status.as_u16(), body })
    }
}
