//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 with the `S256` method. Every value is drawn from the
//! operating system CSPRNG and lives for a single authorization attempt.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The only challenge method we send.
pub const CHALLENGE_METHOD_S256: &str = "S256";

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 32;

fn random_url_safe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a code verifier
///
/// 32 random bytes encoded as base64url without padding (43 characters,
/// inside the 43-128 range RFC 7636 requires).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_url_safe(VERIFIER_BYTES)
}

/// `BASE64URL(SHA256(ASCII(code_verifier)))`, unpadded.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection
#[must_use]
pub fn generate_state() -> String {
    random_url_safe(STATE_BYTES)
}

/// Byte-exact comparison of the state we sent with the one we got back.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected.as_bytes() == actual.as_bytes()
}

/// PKCE parameters for one authorization attempt
///
/// The verifier stays in memory until the code exchange; the challenge goes
/// out in the authorization URL. Never persisted.
#[derive(Clone)]
pub struct PkceParams {
    pub verifier: String,
    pub challenge: String,
}

impl PkceParams {
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        Self { verifier, challenge }
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        CHALLENGE_METHOD_S256
    }
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}
