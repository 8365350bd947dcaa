//! Authorization request URL construction (RFC 6749 §4.1.1 + RFC 7636 §4.3)

use url::Url;

use super::pkce::PkceParams;

/// Parameters of a browser authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub authorize_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub state: &'a str,
    pub pkce: &'a PkceParams,
}

impl AuthorizationRequest<'_> {
    /// Build the URL the user's browser is sent to.
    ///
    /// # Errors
    /// Returns the parse error if the authorize endpoint is not a valid URL.
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            self.authorize_endpoint,
            &[
                ("client_id", self.client_id),
                ("redirect_uri", self.redirect_uri),
                ("response_type", "code"),
                ("scope", self.scope),
                ("state", self.state),
                ("code_challenge", self.pkce.challenge.as_str()),
                ("code_challenge_method", self.pkce.method()),
            ],
        )
    }
}
