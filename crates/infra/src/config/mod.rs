//! Configuration resolution
//!
//! Provides the flag / environment / default resolver that produces the
//! immutable [`authgate_domain::AuthGateConfig`].

pub mod loader;
