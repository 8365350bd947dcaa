//! Human-readable summaries printed around authentication

use std::fmt::Write;

use authgate_common::redact::token_preview;
use authgate_core::{ResourceResponse, TokenSource};
use authgate_domain::{AuthGateConfig, TokenRecord};
use chrono::{DateTime, Utc};

pub fn banner(config: &AuthGateConfig) -> String {
    format!(
        "=== AuthGate CLI (Browser + Device Code Flow) ===\n\
         Client mode : {}\n\
         Server URL  : {}\n\
         Client ID   : {}\n",
        config.client_mode(),
        config.server_url,
        config.client_id
    )
}

pub fn source_line(source: TokenSource) -> &'static str {
    match source {
        TokenSource::Cached => "Found existing tokens; access token is still valid, using it.",
        TokenSource::Refreshed => "Token refreshed successfully.",
        TokenSource::Browser => "Obtained new tokens via the browser flow.",
        TokenSource::Device => "Obtained new tokens via the device flow.",
    }
}

/// `1h 2m 3s` style lifetime, `expired` once past.
pub fn format_remaining(record: &TokenRecord, now: DateTime<Utc>) -> String {
    let secs = (record.expires_at - now).num_seconds();
    if secs <= 0 {
        return "expired".to_string();
    }
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m {seconds}s"),
    }
}

pub fn token_summary(record: &TokenRecord, now: DateTime<Utc>) -> String {
    let rule = "=".repeat(40);
    let mut text = String::new();
    let _ = writeln!(text, "\n{rule}\nCurrent Token Info:");
    let _ = writeln!(text, "Access Token : {}", token_preview(&record.access_token));
    let _ = writeln!(text, "Token Type   : {}", record.token_type);
    let _ = writeln!(text, "Expires In   : {}", format_remaining(record, now));
    if let Some(flow) = record.flow {
        let _ = writeln!(text, "Auth Flow    : {flow}");
    }
    let _ = write!(text, "{rule}");
    text
}

/// Status line for the demo API call; `Err` for anything outside 2xx.
pub fn resource_outcome(response: &ResourceResponse) -> Result<String, String> {
    if (200..300).contains(&response.status) {
        Ok(format!("API call succeeded with status {}", response.status))
    } else {
        let body = response.body.trim();
        if body.is_empty() {
            Err(format!("API call failed with status {}", response.status))
        } else {
            Err(format!("API call failed with status {}: {body}", response.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use authgate_domain::FlowLabel;
    use chrono::Duration;

    use super::*;

    fn record(lifetime: Duration, flow: Option<FlowLabel>) -> (TokenRecord, DateTime<Utc>) {
        let now = Utc::now();
        let record = TokenRecord {
            access_token: "t".repeat(64),
            refresh_token: None,
            token_type: "Bearer".into(),
            expires_at: now + lifetime,
            client_id: "cli".into(),
            flow,
        };
        (record, now)
    }

    #[test]
    fn remaining_lifetime_formats() {
        let (r, now) = record(Duration::seconds(3723), None);
        assert_eq!(format_remaining(&r, now), "1h 2m 3s");
        let (r, now) = record(Duration::seconds(125), None);
        assert_eq!(format_remaining(&r, now), "2m 5s");
        let (r, now) = record(Duration::seconds(9), None);
        assert_eq!(format_remaining(&r, now), "9s");
        let (r, now) = record(Duration::seconds(-1), None);
        assert_eq!(format_remaining(&r, now), "expired");
    }

    #[test]
    fn summary_redacts_token_and_shows_flow() {
        let (r, now) = record(Duration::hours(1), Some(FlowLabel::Device));
        let text = token_summary(&r, now);
        assert!(text.contains(&format!("Access Token : {}...", "t".repeat(50))));
        assert!(!text.contains(&"t".repeat(51)));
        assert!(text.contains("Auth Flow    : device"));
        assert!(text.contains("Expires In   : 1h 0m 0s"));
    }

    #[test]
    fn summary_omits_unknown_flow() {
        let (r, now) = record(Duration::hours(1), None);
        assert!(!token_summary(&r, now).contains("Auth Flow"));
    }

    #[test]
    fn banner_shows_client_mode() {
        let mut config = AuthGateConfig::new("abc");
        assert!(banner(&config).contains("Client mode : public (PKCE)"));
        config.client_secret = Some("s".into());
        assert!(banner(&config).contains("Client mode : confidential"));
    }

    #[test]
    fn resource_outcome_separates_success_from_failure() {
        let ok = ResourceResponse { status: 200, body: "{}".into() };
        assert_eq!(resource_outcome(&ok), Ok("API call succeeded with status 200".into()));

        let denied = ResourceResponse { status: 403, body: " forbidden\n".into() };
        assert_eq!(
            resource_outcome(&denied),
            Err("API call failed with status 403: forbidden".into())
        );

        let empty = ResourceResponse { status: 500, body: String::new() };
        assert_eq!(resource_outcome(&empty), Err("API call failed with status 500".into()));
    }
}
