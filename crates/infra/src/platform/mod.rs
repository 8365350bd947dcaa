//! Host environment adapters

mod browser;
mod env_probe;

pub use browser::SystemBrowserLauncher;
pub use env_probe::EnvProbe;
