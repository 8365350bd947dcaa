//! Command-line parsing
//!
//! Accepts `--flag value`, `--flag=value` and the single-dash forms.

use authgate_infra::ConfigOverrides;
use thiserror::Error;

pub const USAGE: &str = "\
Usage: authgate [OPTIONS]

Obtain an OAuth 2.0 access token, preferring the browser (Authorization Code
+ PKCE) and falling back to the Device Authorization Grant.

Options:
  --server-url <URL>       OAuth server base URL [env: SERVER_URL] (default: http://localhost:8080)
  --client-id <ID>         OAuth client identifier [env: CLIENT_ID] (required)
  --client-secret <SECRET> Confidential client secret [env: CLIENT_SECRET] (omit for public/PKCE clients)
  --redirect-uri <URI>     Registered redirect URI [env: REDIRECT_URI] (default: http://localhost:PORT/callback)
  --port <PORT>            Local callback port [env: CALLBACK_PORT] (default: 8888)
  --scope <SCOPES>         Space-separated scopes [env: SCOPE] (default: \"read write\")
  --token-file <PATH>      Token cache file [env: TOKEN_FILE] (default: .authgate-tokens.json)
  --device                 Force the device flow
  --no-browser             Alias for --device
  -h, --help               Print this help
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(ConfigOverrides),
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("option --{0} requires a value")]
    MissingValue(String),
    #[error("option --{0} does not take a value")]
    UnexpectedValue(String),
    #[error("invalid port {0:?}: expected a number between 1 and 65535")]
    InvalidPort(String),
    #[error("unexpected argument: {0}")]
    Positional(String),
}

pub fn parse<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut overrides = ConfigOverrides::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            return Err(ArgsError::Positional(arg));
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (flag.to_string(), None),
        };

        match name.as_str() {
            "h" | "help" => return Ok(Command::Help),
            "device" | "no-browser" => {
                if inline.is_some() {
                    return Err(ArgsError::UnexpectedValue(name));
                }
                overrides.force_device = true;
            }
            "server-url" | "client-id" | "client-secret" | "redirect-uri" | "port" | "scope"
            | "token-file" => {
                let value = match inline {
                    Some(value) => value,
                    None => args.next().ok_or_else(|| ArgsError::MissingValue(name.clone()))?,
                };
                apply(&mut overrides, &name, value)?;
            }
            _ => return Err(ArgsError::UnknownOption(arg)),
        }
    }

    Ok(Command::Run(overrides))
}

fn apply(overrides: &mut ConfigOverrides, name: &str, value: String) -> Result<(), ArgsError> {
    match name {
        "server-url" => overrides.server_url = Some(value),
        "client-id" => overrides.client_id = Some(value),
        "client-secret" => overrides.client_secret = Some(value),
        "redirect-uri" => overrides.redirect_uri = Some(value),
        "scope" => overrides.scope = Some(value),
        "token-file" => overrides.token_file = Some(value),
        "port" => match value.parse::<u16>() {
            Ok(port) if port != 0 => overrides.callback_port = Some(port),
            _ => return Err(ArgsError::InvalidPort(value)),
        },
        _ => return Err(ArgsError::UnknownOption(format!("--{name}"))),
    }
    Ok(())
}
