use authgate_core::BrowserLauncher;
use authgate_domain::{AuthGateError, Result};
use tracing::{debug, warn};

/// Opens URLs with the platform handler (`xdg-open`, `open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowserLauncher;

impl BrowserLauncher for SystemBrowserLauncher {
    fn open(&self, url: &str) -> Result<()> {
        match open::that_detached(url) {
            Ok(()) => {
                debug!("browser.launched");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "browser.launch_failed");
                Err(AuthGateError::BrowserLaunchFailed(err.to_string()))
            }
        }
    }
}
