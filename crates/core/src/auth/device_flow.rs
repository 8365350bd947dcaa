//! RFC 8628 Device Authorization Grant poller
//!
//! Two independent cadences run on one task: the poll timer, which drives
//! sequential token requests, and a fixed progress tick for the terminal.
//! The device code expiry and the cancellation token bound both.

use std::sync::Arc;
use std::time::Duration;

use authgate_domain::constants::{
    POLL_INTERVAL_CEILING, PROGRESS_TICK, SLOW_DOWN_MULTIPLIER,
};
use authgate_domain::{
    AuthGateConfig, AuthGateError, DeviceAuthorization, FlowLabel, Result, TokenRecord,
};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::{DevicePoll, OAuthApi, ProgressReporter, TokenStore};
use super::records::{persist, record_from_response};

/// Poll period after `k` consecutive `slow_down` responses
///
/// `base` until the first `slow_down`, then `max(base, min(base * 1.5^k, 60 s))`.
/// A server interval above the ceiling is always honoured. The count never
/// decreases within a run, so the period stays elevated after the server
/// stops asking us to slow down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollBackoff {
    base: Duration,
    slow_downs: u32,
}

impl PollBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base, slow_downs: 0 }
    }

    pub fn current(&self) -> Duration {
        if self.slow_downs == 0 {
            return self.base;
        }
        let exponent = i32::try_from(self.slow_downs).unwrap_or(i32::MAX);
        let scaled = self.base.as_secs_f64() * SLOW_DOWN_MULTIPLIER.powi(exponent);
        let stretched = if !scaled.is_finite() || scaled >= POLL_INTERVAL_CEILING.as_secs_f64() {
            POLL_INTERVAL_CEILING
        } else {
            Duration::from_secs_f64(scaled)
        };
        stretched.max(self.base)
    }

    /// Record a `slow_down` and return the new period.
    pub fn slow_down(&mut self) -> Duration {
        self.slow_downs = self.slow_downs.saturating_add(1);
        self.current()
    }

    pub fn slow_downs(&self) -> u32 {
        self.slow_downs
    }
}

/// Stand-in deadline for lifetimes the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(from: Instant, wait: Duration) -> Instant {
    from.checked_add(wait)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Device flow poller
pub struct DeviceFlow {
    config: Arc<AuthGateConfig>,
    api: Arc<dyn OAuthApi>,
    store: Arc<dyn TokenStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl DeviceFlow {
    pub fn new(
        config: Arc<AuthGateConfig>,
        api: Arc<dyn OAuthApi>,
        store: Arc<dyn TokenStore>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self { config, api, store, reporter }
    }

    /// Request a device code, show it, poll until a terminal outcome and
    /// persist the resulting record.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<TokenRecord> {
        let authorization = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthGateError::Cancelled),
            result = self.api.request_device_code() => result?,
        };
        info!(
            expires_in = authorization.expires_in,
            interval = authorization.interval,
            "device_flow.code_issued"
        );
        self.reporter.device_code(&authorization);

        let record = self.poll(&authorization, cancel).await?;
        persist(self.store.as_ref(), self.reporter.as_ref(), &record).await;
        self.reporter.authorized(FlowLabel::Device);
        Ok(record)
    }

    async fn poll(
        &self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
    ) -> Result<TokenRecord> {
        let started = Instant::now();
        let mut backoff = PollBackoff::new(authorization.poll_interval());

        let expiry = sleep_until(deadline_after(started, authorization.lifetime()));
        tokio::pin!(expiry);
        let next_poll = sleep_until(deadline_after(started, backoff.current()));
        tokio::pin!(next_poll);

        let mut progress = interval_at(started + PROGRESS_TICK, PROGRESS_TICK);
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempts, "device_flow.cancelled");
                    return Err(AuthGateError::Cancelled);
                }
                () = &mut expiry => {
                    warn!(attempts, "device_flow.expired");
                    return Err(AuthGateError::DeviceCodeExpired);
                }
                () = &mut next_poll => {}
                _ = progress.tick() => {
                    self.reporter.poll_tick();
                    continue;
                }
            }

            attempts += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AuthGateError::Cancelled),
                () = &mut expiry => return Err(AuthGateError::DeviceCodeExpired),
                result = self.api.poll_device_token(&authorization.device_code) => result?,
            };

            match outcome {
                DevicePoll::Granted(response) => {
                    info!(attempts, "device_flow.authorized");
                    return record_from_response(
                        &self.config.client_id,
                        response,
                        Some(FlowLabel::Device),
                    );
                }
                DevicePoll::Pending => {
                    debug!(attempts, "device_flow.pending");
                }
                DevicePoll::SlowDown => {
                    let period = backoff.slow_down();
                    info!(
                        attempts,
                        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                        "device_flow.slow_down"
                    );
                    self.reporter.slowed_down(period);
                }
                DevicePoll::Expired => return Err(AuthGateError::DeviceCodeExpired),
                DevicePoll::Denied => return Err(AuthGateError::AuthorizationDenied),
                DevicePoll::Failed { error, description } => {
                    return Err(AuthGateError::OAuth { error, description });
                }
            }

            next_poll.as_mut().reset(deadline_after(Instant::now(), backoff.current()));
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::{MockOAuthApi, MockTokenStore, RecordingReporter};

    fn flow(api: Arc<MockOAuthApi>, store: Arc<MockTokenStore>) -> DeviceFlow {
        DeviceFlow::new(
            Arc::new(AuthGateConfig::new("cli-app")),
            api,
            store,
            Arc::new(RecordingReporter::new()),
        )
    }

    #[test]
    fn backoff_follows_the_documented_sequence() {
        let mut backoff = PollBackoff::new(Duration::from_secs(1));
        assert_eq!(backoff.current(), Duration::from_secs(1));
        assert_eq!(backoff.slow_down(), Duration::from_millis(1500));
        assert_eq!(backoff.slow_down(), Duration::from_millis(2250));
        assert_eq!(backoff.slow_downs(), 2);
    }

    #[test]
    fn backoff_is_clamped_at_sixty_seconds() {
        let mut backoff = PollBackoff::new(Duration::from_secs(50));
        assert_eq!(backoff.slow_down(), Duration::from_secs(60));
        for _ in 0..200 {
            backoff.slow_down();
        }
        assert_eq!(backoff.current(), Duration::from_secs(60));
    }

    #[test]
    fn server_interval_above_ceiling_is_honoured() {
        let mut backoff = PollBackoff::new(Duration::from_secs(120));
        assert_eq!(backoff.current(), Duration::from_secs(120));
        assert_eq!(backoff.slow_down(), Duration::from_secs(120));
        assert_eq!(backoff.slow_down(), Duration::from_secs(120));
    }

    proptest! {
        #[test]
        fn prop_backoff_matches_closed_form(base_secs in 1u64..=30, k in 0u32..20) {
            let mut backoff = PollBackoff::new(Duration::from_secs(base_secs));
            for _ in 0..k {
                backoff.slow_down();
            }
            let expected = (base_secs as f64 * 1.5f64.powi(k as i32)).min(60.0);
            prop_assert!((backoff.current().as_secs_f64() - expected).abs() < 1e-6);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_down_stretches_intervals_and_stays_elevated() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(1, 600)));
        api.push_poll(Ok(DevicePoll::SlowDown));
        api.push_poll(Ok(DevicePoll::SlowDown));
        api.push_poll(Ok(DevicePoll::Pending));
        api.push_poll(Ok(DevicePoll::Pending));
        api.push_poll(Ok(DevicePoll::Granted(MockOAuthApi::token("D".repeat(20), Some("R"), 3600))));
        let store = Arc::new(MockTokenStore::new());

        let record = flow(api.clone(), store.clone()).run(&CancellationToken::new()).await.unwrap();

        assert_eq!(record.access_token, "D".repeat(20));
        assert_eq!(record.flow, Some(FlowLabel::Device));
        assert_eq!(store.get("cli-app"), Some(record));

        let gaps: Vec<f64> = api.poll_gaps().iter().map(Duration::as_secs_f64).collect();
        assert_eq!(api.poll_count(), 5);
        let expected = [1.0, 1.5, 2.25, 2.25, 2.25];
        for (gap, want) in gaps.iter().zip(expected) {
            assert!((gap - want).abs() < 0.01, "gaps {gaps:?}");
        }
    }

    /// Validates that absurd device code lifetimes do not break the poller.
    ///
    /// Assertions:
    /// - `expires_in = u64::MAX` still polls and completes
    /// - `interval = u64::MAX` waits out the code and reports expiry
    #[tokio::test(start_paused = true)]
    async fn unrepresentable_deadlines_are_tolerated() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(1, u64::MAX)));
        api.push_poll(Ok(DevicePoll::Granted(MockOAuthApi::token("D".repeat(20), None, 60))));

        let record = flow(api.clone(), Arc::new(MockTokenStore::new()))
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.access_token, "D".repeat(20));
        assert_eq!(api.poll_count(), 1);

        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(u64::MAX, 5)));
        api.keep_pending();

        let err = flow(api.clone(), Arc::new(MockTokenStore::new()))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, AuthGateError::DeviceCodeExpired);
        assert_eq!(api.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_defaults_to_five_seconds() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(0, 600)));
        api.push_poll(Ok(DevicePoll::Granted(MockOAuthApi::token("D".repeat(20), None, 60))));

        flow(api.clone(), Arc::new(MockTokenStore::new()))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let gaps = api.poll_gaps();
        assert!((gaps[0].as_secs_f64() - 5.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_map_to_their_kinds() {
        for (poll, check) in [
            (DevicePoll::Expired, AuthGateError::DeviceCodeExpired),
            (DevicePoll::Denied, AuthGateError::AuthorizationDenied),
            (
                DevicePoll::Failed { error: "invalid_client".into(), description: "bad".into() },
                AuthGateError::oauth("invalid_client", "bad"),
            ),
        ] {
            let api = Arc::new(MockOAuthApi::new());
            api.push_device_code(Ok(MockOAuthApi::device_code(1, 600)));
            api.push_poll(Ok(poll));

            let err = flow(api, Arc::new(MockTokenStore::new()))
                .run(&CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err, check);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn device_code_expiry_bounds_polling() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(2, 7)));
        api.keep_pending();

        let begun = Instant::now();
        let err = flow(api.clone(), Arc::new(MockTokenStore::new()))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, AuthGateError::DeviceCodeExpired);
        assert!(begun.elapsed() <= Duration::from_secs(7) + Duration::from_millis(10));
        assert_eq!(api.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_promptly() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(5, 600)));
        api.keep_pending();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let err = flow(api.clone(), Arc::new(MockTokenStore::new())).run(&cancel).await.unwrap_err();
        assert_eq!(err, AuthGateError::Cancelled);
        assert_eq!(api.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_terminal() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(1, 600)));
        api.push_poll(Err(AuthGateError::Transport("connection reset".into())));

        let err = flow(api, Arc::new(MockTokenStore::new()))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthGateError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticks_every_two_seconds() {
        let api = Arc::new(MockOAuthApi::new());
        api.push_device_code(Ok(MockOAuthApi::device_code(5, 600)));
        api.push_poll(Ok(DevicePoll::Pending));
        api.push_poll(Ok(DevicePoll::Granted(MockOAuthApi::token("D".repeat(20), None, 60))));
        let reporter = Arc::new(RecordingReporter::new());
        let flow = DeviceFlow::new(
            Arc::new(AuthGateConfig::new("cli-app")),
            api,
            Arc::new(MockTokenStore::new()),
            reporter.clone(),
        );

        flow.run(&CancellationToken::new()).await.unwrap();
        // Polls at 5 s and 10 s; ticks at 2, 4, 6, 8 (10 races with the poll).
        assert!((4..=5).contains(&reporter.ticks()), "ticks = {}", reporter.ticks());
    }
}
