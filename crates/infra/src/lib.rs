//! # AuthGate Infrastructure
//!
//! Infrastructure implementations of the `authgate-core` ports.
//!
//! This crate contains:
//! - The retrying TLS 1.2+ HTTP transport and the OAuth endpoint client
//! - The JSON token file store and its `.lock` sidecar
//! - The loopback callback listener
//! - Environment probing and the system browser launcher
//! - Flag / environment / default configuration resolution
//!
//! ## Architecture
//! - Implements traits defined in `authgate-core`
//! - Contains all "impure" code (sockets, files, processes)

pub mod callback;
pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod platform;
pub mod storage;

// Re-export commonly used items
pub use callback::LoopbackCallbackListener;
pub use config::loader::{resolve, resolve_from_env, ConfigOverrides, ResolvedConfig};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use oauth::HttpOAuthApi;
pub use platform::{EnvProbe, SystemBrowserLauncher};
pub use storage::{FileLock, FileTokenStore};
