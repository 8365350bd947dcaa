//! OAuth 2.0 + PKCE building blocks
//!
//! Pure functions and wire types; no network or file I/O lives here.

pub mod authorize;
pub mod pkce;
pub mod types;

pub use authorize::AuthorizationRequest;
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, validate_state, PkceParams,
};
pub use types::{OAuthErrorResponse, TokenResponse, TokenValidationError};
