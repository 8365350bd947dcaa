//! Integration tests for the OAuth endpoint client
//!
//! Runs `HttpOAuthApi` against a wiremock authorization server and checks the
//! exact forms sent and the mapping of server responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use authgate_core::{DevicePoll, OAuthApi};
use authgate_domain::{AuthGateConfig, AuthGateError};
use authgate_infra::{HttpClient, HttpOAuthApi};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer, secret: Option<&str>) -> HttpOAuthApi {
    let mut config = AuthGateConfig::new("cli-app");
    config.server_url = server.uri();
    config.client_secret = secret.map(str::to_string);
    let http = HttpClient::builder()
        .base_backoff(Duration::from_millis(10))
        .build()
        .unwrap();
    HttpOAuthApi::new(Arc::new(config), http)
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "A".repeat(16),
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "R"
    })
}

async fn last_form(server: &MockServer) -> HashMap<String, String> {
    let requests = server.received_requests().await.unwrap();
    let request = requests.last().unwrap();
    url::form_urlencoded::parse(&request.body).into_owned().collect()
}

fn oauth_error(error: &str, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": error,
        "error_description": description
    }))
}

/// Validates the public client code exchange scenario.
///
/// Assertions:
/// - `code_verifier` is always sent
/// - `client_secret` is absent for a public client
#[tokio::test]
async fn public_code_exchange_sends_verifier_without_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let response = api_for(&server, None).exchange_code("c0", "verifier-123").await.unwrap();
    assert_eq!(response.access_token, "A".repeat(16));

    let form = last_form(&server).await;
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "c0");
    assert_eq!(form["code_verifier"], "verifier-123");
    assert_eq!(form["client_id"], "cli-app");
    assert_eq!(form["redirect_uri"], "http://localhost:8888/callback");
    assert!(!form.contains_key("client_secret"));
}

/// Validates the confidential client code exchange scenario.
///
/// Assertions:
/// - Both the verifier and the secret are sent
#[tokio::test]
async fn confidential_code_exchange_adds_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    api_for(&server, Some("s3cret")).exchange_code("c0", "v").await.unwrap();

    let form = last_form(&server).await;
    assert_eq!(form["client_secret"], "s3cret");
    assert_eq!(form["code_verifier"], "v");
}

/// Validates the rejected refresh token scenario.
///
/// Assertions:
/// - `invalid_grant` and `invalid_token` map to `RefreshTokenExpired`
/// - Other OAuth errors surface verbatim
#[tokio::test]
async fn refresh_rejections_map_to_expired_sentinel() {
    for rejection in ["invalid_grant", "invalid_token"] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(oauth_error(rejection, "refresh token expired"))
            .mount(&server)
            .await;

        let err = api_for(&server, None).refresh("old-refresh").await.unwrap_err();
        assert_eq!(err, AuthGateError::RefreshTokenExpired, "{rejection}");
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(oauth_error("unauthorized_client", "client disabled"))
        .mount(&server)
        .await;
    let err = api_for(&server, None).refresh("old-refresh").await.unwrap_err();
    assert_eq!(err.to_string(), "unauthorized_client: client disabled");
}

/// Validates the refresh form scenario.
///
/// Assertions:
/// - The refresh token and client id are sent
#[tokio::test]
async fn refresh_sends_token_and_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "B".repeat(20),
            "token_type": "Bearer",
            "expires_in": 60
        })))
        .mount(&server)
        .await;

    let response = api_for(&server, Some("s3cret")).refresh("old-refresh").await.unwrap();
    assert!(response.issued_refresh_token().is_none());

    let form = last_form(&server).await;
    assert_eq!(form["grant_type"], "refresh_token");
    assert_eq!(form["refresh_token"], "old-refresh");
    assert_eq!(form["client_secret"], "s3cret");
}

/// Validates the device code request scenario.
///
/// Assertions:
/// - The form carries `client_id` and `scope`
/// - A transient 503 is retried transparently
#[tokio::test]
async fn device_code_request_is_retried_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://auth.example.com/device",
            "expires_in": 600,
            "interval": 5
        })))
        .mount(&server)
        .await;

    let authorization = api_for(&server, None).request_device_code().await.unwrap();
    assert_eq!(authorization.user_code, "ABCD-EFGH");
    assert_eq!(authorization.poll_interval(), Duration::from_secs(5));

    let form = last_form(&server).await;
    assert_eq!(form["client_id"], "cli-app");
    assert_eq!(form["scope"], "read write");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

/// Validates the device token poll mapping scenario.
///
/// Assertions:
/// - Each RFC 8628 error maps to its poll outcome
/// - Unknown errors keep their code and description
#[tokio::test]
async fn device_poll_responses_are_classified() {
    let cases = [
        ("authorization_pending", "pending"),
        ("slow_down", "slow_down"),
        ("expired_token", "expired"),
        ("access_denied", "denied"),
        ("server_on_fire", "failed"),
    ];

    for (error, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("device_code=dev-123"))
            .respond_with(oauth_error(error, "details"))
            .mount(&server)
            .await;

        let outcome = api_for(&server, None).poll_device_token("dev-123").await.unwrap();
        let actual = match outcome {
            DevicePoll::Pending => "pending",
            DevicePoll::SlowDown => "slow_down",
            DevicePoll::Expired => "expired",
            DevicePoll::Denied => "denied",
            DevicePoll::Failed { ref error, ref description } => {
                assert_eq!(error, "server_on_fire");
                assert_eq!(description, "details");
                "failed"
            }
            DevicePoll::Granted(_) => "granted",
        };
        assert_eq!(actual, expected, "{error}");

        let form = last_form(&server).await;
        assert_eq!(form["grant_type"], "urn:ietf:params:oauth:grant-type:device_code");
        assert!(!form.contains_key("client_secret"));
    }
}

/// Validates the tokeninfo scenario.
///
/// Assertions:
/// - The access token travels as a Bearer header
/// - Error bodies surface as `<error>: <description>`
/// - Other bodies cite the HTTP status
#[tokio::test]
async fn token_info_uses_bearer_and_maps_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/tokeninfo"))
        .and(header("authorization", "Bearer good-token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"active":true}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/tokeninfo"))
        .and(header("authorization", "Bearer revoked-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_token",
            "error_description": "token revoked"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/tokeninfo"))
        .and(header("authorization", "Bearer weird-token"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .mount(&server)
        .await;

    let api = api_for(&server, None);
    assert_eq!(api.token_info("good-token-123").await.unwrap(), r#"{"active":true}"#);
    assert_eq!(
        api.token_info("revoked-token").await.unwrap_err().to_string(),
        "invalid_token: token revoked"
    );
    assert_eq!(
        api.token_info("weird-token").await.unwrap_err(),
        AuthGateError::Transport("status 418: teapot".into())
    );
}

/// Validates the resource call scenario.
///
/// Assertions:
/// - Non-success statuses are returned as data, not errors
#[tokio::test]
async fn resource_call_returns_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/tokeninfo"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let response = api_for(&server, None).fetch_resource("some-token").await.unwrap();
    assert_eq!(response.status, 401);
    assert_eq!(response.body, "expired");
}
