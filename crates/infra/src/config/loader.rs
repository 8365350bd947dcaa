//! Configuration loader
//!
//! Resolves the client configuration once at startup.
//!
//! ## Precedence
//! 1. Command-line flag
//! 2. Environment variable
//! 3. Built-in default
//!
//! An empty string counts as unset at every level.
//!
//! ## Environment Variables
//! - `SERVER_URL`: OAuth server base URL
//! - `CLIENT_ID`: OAuth client identifier (required)
//! - `CLIENT_SECRET`: enables confidential-client mode
//! - `REDIRECT_URI`: registered redirect URI
//! - `CALLBACK_PORT`: local callback port
//! - `SCOPE`: space-separated scopes
//! - `TOKEN_FILE`: token cache path

use std::path::PathBuf;

use authgate_domain::constants::{
    DEFAULT_CALLBACK_PORT, DEFAULT_SCOPE, DEFAULT_SERVER_URL, DEFAULT_TOKEN_FILE,
};
use authgate_domain::{default_redirect_uri, AuthGateConfig, AuthGateError, Result};
use url::Url;

/// Values supplied on the command line. `None` means the flag was not given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub callback_port: Option<u16>,
    pub scope: Option<String>,
    pub token_file: Option<String>,
    pub force_device: bool,
}

/// A validated configuration plus the non-fatal warnings raised while
/// resolving it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AuthGateConfig,
    pub warnings: Vec<String>,
}

/// Resolve the configuration from flags and an environment lookup.
///
/// # Errors
/// Returns `AuthGateError::Config` if the server URL is invalid or no client
/// id was provided.
pub fn resolve<F>(overrides: ConfigOverrides, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |flag: Option<String>, key: &str, default: &str| -> String {
        non_empty(flag).or_else(|| non_empty(env(key))).unwrap_or_else(|| default.to_string())
    };

    let server_url = pick(overrides.server_url, "SERVER_URL", DEFAULT_SERVER_URL);
    let client_id = pick(overrides.client_id, "CLIENT_ID", "");
    let client_secret = non_empty(Some(pick(overrides.client_secret, "CLIENT_SECRET", "")));
    let scope = pick(overrides.scope, "SCOPE", DEFAULT_SCOPE);
    let token_file = pick(overrides.token_file, "TOKEN_FILE", DEFAULT_TOKEN_FILE);

    let callback_port = overrides
        .callback_port
        .filter(|port| *port != 0)
        .or_else(|| env_port(&env))
        .unwrap_or(DEFAULT_CALLBACK_PORT);
    let redirect_uri =
        pick(overrides.redirect_uri, "REDIRECT_URI", &default_redirect_uri(callback_port));

    validate_server_url(&server_url)
        .map_err(|reason| AuthGateError::Config(format!("invalid SERVER_URL: {reason}")))?;

    let mut warnings = Vec::new();
    if server_url.to_ascii_lowercase().starts_with("http://") {
        warnings.push(
            "Using HTTP instead of HTTPS. Tokens will be transmitted in plaintext! \
             This is only safe for local development."
                .to_string(),
        );
    }

    if client_id.is_empty() {
        return Err(AuthGateError::Config(
            "CLIENT_ID not set. Please provide it via:\n  \
             1. Command-line flag: --client-id=<your-client-id>\n  \
             2. Environment variable: CLIENT_ID=<your-client-id>\n  \
             3. .env file: CLIENT_ID=<your-client-id>"
                .to_string(),
        ));
    }

    if uuid::Uuid::parse_str(&client_id).is_err() {
        warnings.push(format!("CLIENT_ID doesn't appear to be a valid UUID: {client_id}"));
    }

    tracing::debug!(server_url = %server_url, callback_port, "config.resolved");

    Ok(ResolvedConfig {
        config: AuthGateConfig {
            server_url,
            client_id,
            client_secret,
            redirect_uri,
            callback_port,
            scope,
            token_file: PathBuf::from(token_file),
            force_device: overrides.force_device,
        },
        warnings,
    })
}

/// Resolve against the process environment.
///
/// # Errors
/// See [`resolve`].
pub fn resolve_from_env(overrides: ConfigOverrides) -> Result<ResolvedConfig> {
    resolve(overrides, |key| std::env::var(key).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Invalid or zero values fall back to the default port.
fn env_port<F>(env: &F) -> Option<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(env("CALLBACK_PORT"))?;
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Some(port),
        _ => {
            tracing::debug!(value = %raw, "config.invalid_callback_port");
            None
        }
    }
}

/// Check that `raw` is an absolute http(s) URL with a host.
pub fn validate_server_url(raw: &str) -> std::result::Result<(), String> {
    if raw.is_empty() {
        return Err("server URL cannot be empty".to_string());
    }
    let url = Url::parse(raw).map_err(|e| format!("invalid URL format: {e}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("URL scheme must be http or https, got: {}", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL must include a host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const UUID: &str = "6f1c2a5e-8a1b-4b47-9a7e-2d3c4b5a6f70";

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn with_client(id: &str) -> ConfigOverrides {
        ConfigOverrides { client_id: Some(id.to_string()), ..ConfigOverrides::default() }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let resolved = resolve(with_client(UUID), env_of(&[])).unwrap();
        let config = resolved.config;
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.callback_port, 8888);
        assert_eq!(config.redirect_uri, "http://localhost:8888/callback");
        assert_eq!(config.scope, "read write");
        assert_eq!(config.token_file, PathBuf::from(".authgate-tokens.json"));
        assert!(config.client_secret.is_none());
        assert!(!config.force_device);
    }

    #[test]
    fn flag_beats_env_beats_default() {
        let env = env_of(&[("SCOPE", "env-scope"), ("SERVER_URL", "https://env.example")]);
        let overrides = ConfigOverrides {
            scope: Some("flag-scope".into()),
            ..with_client(UUID)
        };
        let config = resolve(overrides, env).unwrap().config;
        assert_eq!(config.scope, "flag-scope");
        assert_eq!(config.server_url, "https://env.example");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let env = env_of(&[("SCOPE", ""), ("CLIENT_SECRET", "")]);
        let overrides = ConfigOverrides {
            scope: Some(String::new()),
            client_secret: Some(String::new()),
            ..with_client(UUID)
        };
        let config = resolve(overrides, env).unwrap().config;
        assert_eq!(config.scope, "read write");
        assert!(config.is_public_client());
    }

    #[test]
    fn client_id_from_env() {
        let config = resolve(ConfigOverrides::default(), env_of(&[("CLIENT_ID", UUID)]))
            .unwrap()
            .config;
        assert_eq!(config.client_id, UUID);
    }

    #[test]
    fn missing_client_id_lists_all_sources() {
        let err = resolve(ConfigOverrides::default(), env_of(&[])).unwrap_err();
        let AuthGateError::Config(message) = err else { panic!("expected config error") };
        assert!(message.contains("--client-id"));
        assert!(message.contains("Environment variable: CLIENT_ID"));
        assert!(message.contains(".env file"));
    }

    #[test]
    fn invalid_env_port_falls_back_to_default() {
        for bad in ["abc", "0", "70000", "-1"] {
            let config =
                resolve(with_client(UUID), env_of(&[("CALLBACK_PORT", bad)])).unwrap().config;
            assert_eq!(config.callback_port, 8888, "value {bad}");
        }
    }

    #[test]
    fn port_drives_default_redirect_uri() {
        let config =
            resolve(with_client(UUID), env_of(&[("CALLBACK_PORT", "9999")])).unwrap().config;
        assert_eq!(config.callback_port, 9999);
        assert_eq!(config.redirect_uri, "http://localhost:9999/callback");

        let overrides = ConfigOverrides { callback_port: Some(7777), ..with_client(UUID) };
        let config = resolve(overrides, env_of(&[("CALLBACK_PORT", "9999")])).unwrap().config;
        assert_eq!(config.redirect_uri, "http://localhost:7777/callback");
    }

    #[test]
    fn explicit_redirect_uri_wins() {
        let env = env_of(&[("REDIRECT_URI", "http://127.0.0.1:8888/cb")]);
        let config = resolve(with_client(UUID), env).unwrap().config;
        assert_eq!(config.redirect_uri, "http://127.0.0.1:8888/cb");
    }

    #[test]
    fn confidential_mode_from_secret() {
        let env = env_of(&[("CLIENT_SECRET", "s3cret")]);
        let config = resolve(with_client(UUID), env).unwrap().config;
        assert_eq!(config.client_mode(), "confidential");
    }

    #[test]
    fn http_and_non_uuid_produce_warnings() {
        let resolved = resolve(with_client("my-cli"), env_of(&[])).unwrap();
        assert_eq!(resolved.warnings.len(), 2);
        assert!(resolved.warnings[0].contains("HTTP instead of HTTPS"));
        assert!(resolved.warnings[1].contains("my-cli"));

        let env = env_of(&[("SERVER_URL", "https://auth.example.com")]);
        assert!(resolve(with_client(UUID), env).unwrap().warnings.is_empty());
    }

    #[test]
    fn server_url_validation() {
        assert_eq!(validate_server_url("").unwrap_err(), "server URL cannot be empty");
        assert!(validate_server_url("not a url").unwrap_err().starts_with("invalid URL format"));
        assert_eq!(
            validate_server_url("ftp://example.com").unwrap_err(),
            "URL scheme must be http or https, got: ftp"
        );
        assert!(validate_server_url("https://auth.example.com:8443").is_ok());
    }

    #[test]
    fn invalid_server_url_is_config_error() {
        let env = env_of(&[("SERVER_URL", "ftp://example.com")]);
        let err = resolve(with_client(UUID), env).unwrap_err();
        assert!(matches!(err, AuthGateError::Config(msg) if msg.contains("got: ftp")));
    }

    #[test]
    fn force_device_is_carried() {
        let overrides = ConfigOverrides { force_device: true, ..with_client(UUID) };
        assert!(resolve(overrides, env_of(&[])).unwrap().config.force_device);
    }
}
