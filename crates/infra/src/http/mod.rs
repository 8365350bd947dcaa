//! HTTP transport shared by every OAuth call

mod client;

pub use client::{HttpClient, HttpClientBuilder};
