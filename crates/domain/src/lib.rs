//! # AuthGate Domain
//!
//! Domain types for the AuthGate OAuth 2.0 client.
//!
//! This crate contains:
//! - Token records and the on-disk token store document
//! - Device authorization and browser availability types
//! - The immutable client configuration value
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other AuthGate crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
