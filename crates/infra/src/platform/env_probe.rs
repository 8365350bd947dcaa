//! Decides whether the browser flow can work on this host
//!
//! Checks run in order: SSH without a display, Linux without a display,
//! then a trial bind of the callback port. The trial listener is closed
//! right away; if another process grabs the port before the real listener
//! binds, the browser flow falls back to the device flow.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use authgate_core::EnvironmentProbe;
use authgate_domain::BrowserAvailability;
use tokio::net::TcpListener;
use tracing::debug;

const SSH_VARS: [&str; 3] = ["SSH_TTY", "SSH_CLIENT", "SSH_CONNECTION"];
const DISPLAY_VARS: [&str; 2] = ["DISPLAY", "WAYLAND_DISPLAY"];

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// [`EnvironmentProbe`] over process environment variables
#[derive(Clone)]
pub struct EnvProbe {
    lookup: EnvLookup,
    os: &'static str,
}

impl Default for EnvProbe {
    fn default() -> Self {
        Self::from_process()
    }
}

impl std::fmt::Debug for EnvProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvProbe").field("os", &self.os).finish_non_exhaustive()
    }
}

impl EnvProbe {
    /// Probe reading the real environment of this process.
    pub fn from_process() -> Self {
        Self::with_env(|key| std::env::var(key).ok(), std::env::consts::OS)
    }

    /// Probe with an injected environment and OS name (`"linux"`, `"macos"`, ...).
    pub fn with_env<F>(lookup: F, os: &'static str) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self { lookup: Arc::new(lookup), os }
    }

    fn is_set(&self, key: &str) -> bool {
        (self.lookup)(key).is_some_and(|value| !value.is_empty())
    }

    fn in_ssh_session(&self) -> bool {
        SSH_VARS.iter().any(|key| self.is_set(key))
    }

    fn has_display(&self) -> bool {
        DISPLAY_VARS.iter().any(|key| self.is_set(key))
    }

    /// The environment checks alone, without the port bind.
    pub fn check_environment(&self) -> BrowserAvailability {
        let has_display = self.has_display();
        if self.in_ssh_session() && !has_display {
            return BrowserAvailability::unavailable("SSH session without display forwarding");
        }
        if self.os == "linux" && !has_display {
            return BrowserAvailability::unavailable(
                "no display server (DISPLAY/WAYLAND_DISPLAY not set)",
            );
        }
        BrowserAvailability::available()
    }
}

#[async_trait]
impl EnvironmentProbe for EnvProbe {
    async fn probe(&self, callback_port: u16) -> BrowserAvailability {
        let availability = self.check_environment();
        if !availability.available {
            debug!(reason = %availability.reason, "env_probe.unavailable");
            return availability;
        }

        match TcpListener::bind((Ipv4Addr::LOCALHOST, callback_port)).await {
            Ok(listener) => drop(listener),
            Err(err) => {
                debug!(port = callback_port, error = %err, "env_probe.port_busy");
                return BrowserAvailability::unavailable(format!(
                    "callback port {callback_port} unavailable: {err}"
                ));
            }
        }

        debug!("env_probe.available");
        availability
    }
}
