//! OAuth 2.0 primitives shared by the AuthGate crates.
//!
//! - [`auth::pkce`]: PKCE verifier/challenge and CSRF state generation
//! - [`auth::types`]: token endpoint wire types and response validation
//! - [`auth::authorize`]: authorization URL construction
//! - [`redact`]: safe previews of secrets for display

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod redact;
