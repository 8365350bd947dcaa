//! Terminal rendering of flow progress

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use authgate_core::ProgressReporter;
use authgate_domain::{DeviceAuthorization, FlowLabel};

/// Dots printed on one line before wrapping.
const DOTS_PER_LINE: usize = 50;

/// [`ProgressReporter`] writing to stdout, warnings to stderr
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    dots: AtomicUsize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// End a pending line of progress dots.
    fn break_line(&self) {
        if self.dots.swap(0, Ordering::Relaxed) > 0 {
            println!();
        }
    }

    fn line(&self, text: &str) {
        self.break_line();
        println!("{text}");
    }
}

pub fn device_code_box(authorization: &DeviceAuthorization) -> String {
    let rule = "-".repeat(40);
    let mut text = format!("\n{rule}\nPlease open this link to authorize:\n{}\n", authorization.display_uri());
    if authorization.display_uri() != authorization.verification_uri {
        text.push_str(&format!("\nOr visit : {}\n", authorization.verification_uri));
    }
    text.push_str(&format!("And enter: {}\n{rule}\n", authorization.user_code));
    text
}

impl ProgressReporter for ConsoleReporter {
    fn browser_unavailable(&self, reason: &str) {
        self.line(&format!("Auth method : Device Code Flow ({reason})"));
    }

    fn opening_browser(&self, url: &str) {
        self.line("Auth method : Authorization Code Flow (browser)");
        self.line(&format!("Step 1: Opening browser for authorization...\n\n  {url}\n"));
    }

    fn waiting_for_callback(&self, timeout: Duration) {
        self.line(&format!(
            "Browser opened. Please complete authorization in your browser.\n\
             Step 2: Waiting for callback (up to {}s)...",
            timeout.as_secs()
        ));
    }

    fn falling_back(&self, reason: &str) {
        self.line(&format!("Browser flow did not complete ({reason})."));
        self.line("Auth method : Device Code Flow (fallback)");
    }

    fn device_code(&self, authorization: &DeviceAuthorization) {
        self.line(&device_code_box(authorization));
        self.line("Waiting for authorization...");
    }

    fn poll_tick(&self) {
        let printed = self.dots.fetch_add(1, Ordering::Relaxed) + 1;
        print!(".");
        if printed % DOTS_PER_LINE == 0 {
            println!();
        }
        let _ = std::io::stdout().flush();
    }

    fn slowed_down(&self, interval: Duration) {
        self.line(&format!(
            "Server asked to slow down, polling every {:.1}s",
            interval.as_secs_f64()
        ));
    }

    fn authorized(&self, flow: FlowLabel) {
        self.line(&format!("\nAuthorization successful! ({flow} flow)"));
    }

    fn refreshing(&self) {
        self.line("Access token expired, attempting refresh...");
    }

    fn warning(&self, message: &str) {
        self.break_line();
        eprintln!("Warning: {message}");
    }
}
