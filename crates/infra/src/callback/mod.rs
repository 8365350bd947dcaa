//! Loopback receiver for the browser authorization redirect

mod pages;
mod server;

pub use server::{LoopbackCallbackListener, RunningCallback};
