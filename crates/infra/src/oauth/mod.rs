//! OAuth 2.0 endpoint client

mod client;

pub use client::HttpOAuthApi;
