//! The per-user polling loop.
//!
//! [`UserWatch::tick`] runs one iteration: quota check and recovery, match
//! query, deduplication, hand-off to the notifier, and error policy.
//! [`run_watch_loop`] repeats it with a jittered sleep until stopped.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bagwatch_core::{Notifier, SendOptions, Targets};
use bagwatch_fetch::ApiError;
use bagwatch_market::{Account, MarketError, Match, MatchEngine};
use bagwatch_store::{AppSettings, watch_interval_from_secs};
use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::WatchError;
use crate::policy::{ErrorPolicy, error_text};
use crate::seen::SeenState;

/// Minimum stock for a live notification.
const LIVE_MIN_QTY: u32 = 1;

// ============================================================================
// Limits
// ============================================================================

/// Timing and quota limits of one loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchLimits {
    /// Target time between tick starts.
    pub interval: Duration,
    /// Relative jitter applied to each sleep.
    pub jitter: f64,
    /// Requests allowed between refreshes.
    pub max_requests: u64,
    /// Consecutive failures that trigger recovery.
    pub max_failed_requests: u32,
}

impl WatchLimits {
    /// Limits from the process settings, with an optional interval override.
    pub fn from_settings(settings: &AppSettings, interval_secs: Option<f64>) -> Self {
        let interval = interval_secs
            .and_then(watch_interval_from_secs)
            .unwrap_or_else(|| settings.default_watch_interval());
        Self {
            interval,
            jitter: settings.jitter,
            max_requests: settings.max_requests,
            max_failed_requests: settings.max_failed_requests,
        }
    }
}

/// Sleep before the next tick: `max(interval - elapsed, 0)` scaled by a
/// random factor in `1 ± jitter`.
pub fn next_sleep<R: Rng + ?Sized>(
    interval: Duration,
    elapsed: Duration,
    jitter: f64,
    rng: &mut R,
) -> Duration {
    let base = interval.saturating_sub(elapsed);
    let jitter = jitter.abs().min(1.0);
    if jitter == 0.0 || base.is_zero() {
        return base;
    }
    let factor = 1.0 + rng.gen_range(-jitter..=jitter);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
}

// ============================================================================
// Tick Outcome
// ============================================================================

/// Why a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user asked to stop.
    Requested,
    /// The quota was exceeded and the session could not be renewed.
    QuotaBreach,
    /// The process is shutting down; the user stays marked as watching.
    Shutdown,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Favourites were polled; `notified` items were announced.
    Polled {
        /// Items announced this tick.
        notified: usize,
    },
    /// A classified error was handled.
    Failed,
    /// Polling is paused until a challenge cookie arrives.
    Held,
    /// The loop must end.
    Stop(StopReason),
}

#[derive(Debug, Clone)]
struct ChallengeHold {
    url: String,
    cookie: Option<String>,
}

// ============================================================================
// User Watch
// ============================================================================

/// Everything one user's loop owns.
pub struct UserWatch {
    account: Account,
    engine: MatchEngine,
    seen: SeenState,
    policy: ErrorPolicy,
    notifier: Arc<dyn Notifier>,
    limits: WatchLimits,
    hold: Option<ChallengeHold>,
}

impl std::fmt::Debug for UserWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserWatch")
            .field("user", &self.account.user_id())
            .field("limits", &self.limits)
            .field("seen", &self.seen.len())
            .field("held", &self.hold.is_some())
            .finish_non_exhaustive()
    }
}

impl UserWatch {
    /// Creates the watch state for `account`.
    pub fn new(account: Account, settings: &AppSettings, notifier: Arc<dyn Notifier>) -> Self {
        let limits = WatchLimits::from_settings(settings, account.store().config().watch_interval_secs);
        Self {
            account,
            engine: MatchEngine::new(settings.page_size, settings.max_pages),
            seen: SeenState::new(),
            policy: ErrorPolicy,
            notifier,
            limits,
            hold: None,
        }
    }

    /// Replaces the match engine.
    pub fn with_engine(mut self, engine: MatchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        self.account.user_id()
    }

    /// The user's account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Mutable access to the account.
    pub fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    /// Current limits.
    pub fn limits(&self) -> &WatchLimits {
        &self.limits
    }

    /// Sets the polling interval.
    pub fn set_interval(&mut self, interval: Duration) {
        self.limits.interval = interval;
    }

    /// Dedup memory.
    pub fn seen_mut(&mut self) -> &mut SeenState {
        &mut self.seen
    }

    /// Challenge link polling is held on, if any.
    pub fn held_on(&self) -> Option<&str> {
        self.hold.as_ref().map(|h| h.url.as_str())
    }

    /// Lifts a challenge hold.
    pub fn release_hold(&mut self) {
        self.hold = None;
    }

    async fn notify(&self, text: &str, options: &SendOptions) {
        if let Err(e) = self
            .notifier
            .send_message(self.account.user_id(), text, options)
            .await
        {
            warn!(user = %self.account.user_id(), error = %e, "Failed to deliver message");
        }
    }

    async fn notify_status(&self, text: &str) {
        let options = self.account.store().config().notifications.for_status();
        self.notify(text, &options).await;
    }

    /// Runs one iteration of the loop.
    ///
    /// Classified remote errors are handled here and never returned.
    ///
    /// # Errors
    ///
    /// Anything unclassified (e.g. a config that cannot be saved) ends the
    /// loop as a crash.
    #[instrument(skip(self), fields(user = %self.account.user_id()))]
    pub async fn tick(&mut self) -> Result<TickOutcome, WatchError> {
        if let Some(outcome) = self.sync_from_disk().await? {
            return Ok(outcome);
        }

        if self.still_held().await {
            debug!("Polling held on challenge");
            return Ok(TickOutcome::Held);
        }

        if let Some(outcome) = self.enforce_quota().await? {
            return Ok(outcome);
        }

        let targets = self.account.store().config().targets.clone();
        match self
            .engine
            .get_matches(&mut self.account, &targets, LIVE_MIN_QTY)
            .await
        {
            Ok(report) => {
                self.seen.prune(&report.depleted);
                let notified = self.announce(&report.matches).await;
                Ok(TickOutcome::Polled { notified })
            }
            Err(MarketError::Api(e)) => {
                self.handle_api_error(&e).await?;
                Ok(TickOutcome::Failed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adopts what other processes wrote to the user's file: credentials,
    /// session, targets, preferences, the interval override, and the
    /// watching flag.
    ///
    /// Returns `Stop(Requested)` when the watching flag was cleared there.
    async fn sync_from_disk(&mut self) -> Result<Option<TickOutcome>, WatchError> {
        let was_watching = self.account.store().config().watching;
        let previous = self.account.store().config().targets.clone();
        match self.account.sync_from_disk().await {
            Ok(true) => self.adopt_config(&previous),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not re-read user config, keeping the loaded one"),
        }

        let config = self.account.store().config();
        if was_watching && !config.watching {
            info!("Watching cleared by another process");
            return Ok(Some(TickOutcome::Stop(StopReason::Requested)));
        }
        if config.clear_history_requested {
            self.seen.clear();
            self.account
                .store_mut()
                .update(|c| c.clear_history_requested = false)
                .await?;
            info!("History cleared");
        }
        Ok(None)
    }

    fn adopt_config(&mut self, previous: &Targets) {
        let config = self.account.store().config();
        if let Some(interval) = config.watch_interval_secs.and_then(watch_interval_from_secs) {
            self.limits.interval = interval;
        }
        for removed in previous.iter().filter(|t| config.targets.get(&t.item_id).is_none()) {
            if removed.is_wildcard() {
                self.seen.clear();
            } else {
                self.seen.forget(&removed.item_id);
            }
        }
    }

    async fn still_held(&mut self) -> bool {
        let Some(hold) = &self.hold else {
            return false;
        };
        let current = self.account.store().config().session.challenge_cookie();
        if current.is_none() || current == hold.cookie.as_deref() {
            return true;
        }
        info!("New challenge cookie, resuming");
        self.hold = None;
        self.notify_status("🍪 Cookie received, resuming the watch.").await;
        false
    }

    async fn enforce_quota(&mut self) -> Result<Option<TickOutcome>, WatchError> {
        let counters = self.account.counters();
        let requests = counters.requests_exceeded(self.limits.max_requests);
        let failures = counters.failures_exceeded(self.limits.max_failed_requests);
        if !requests && !failures {
            return Ok(None);
        }

        if requests {
            warn!(requests = counters.requests_since_refresh, "Request ceiling reached");
            self.account.reset_requests();
            self.notify_status(&format!(
                "You've sent too many requests (more than {}). Refreshing the session.",
                self.limits.max_requests
            ))
            .await;
        }
        if failures {
            warn!(failures = counters.consecutive_failures, "Failure threshold reached");
            self.account.reset_failures();
            self.notify_status(&format!(
                "Too many requests have failed ({} in a row). Refreshing the session.",
                counters.consecutive_failures
            ))
            .await;
        }

        match self.account.login().await {
            Ok(()) => Ok(None),
            Err(e) if e.is_logged_out() => {
                error!("Quota recovery impossible without a session");
                let text = e.api_error().map_or_else(|| e.to_string(), error_text);
                self.notify_status(&text).await;
                Ok(Some(TickOutcome::Stop(StopReason::QuotaBreach)))
            }
            Err(MarketError::Api(e)) => {
                self.handle_api_error(&e).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_api_error(&mut self, error: &ApiError) -> Result<(), WatchError> {
        warn!(kind = %error.kind, endpoint = %error.endpoint, status = ?error.status, "Tick failed");
        let action = self.policy.evaluate(error);
        self.notify_status(&action.message).await;

        if let Some(url) = action.hold_challenge {
            let cookie = self
                .account
                .store()
                .config()
                .session
                .challenge_cookie()
                .map(ToString::to_string);
            self.hold = Some(ChallengeHold { url, cookie });
        }

        if action.refresh {
            match self.account.login().await {
                Ok(()) => debug!("Session refreshed after error"),
                Err(MarketError::Api(e)) => {
                    warn!(error = %e, "Refresh after error failed");
                    self.notify_status(&error_text(&e)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn announce(&mut self, matches: &[Match]) -> usize {
        let mut lines = String::new();
        let mut notified = 0;
        for m in matches {
            if !self.seen.should_notify(&m.item_id, m.purchase_end.as_deref()) {
                continue;
            }
            notified += 1;
            let _ = write!(lines, "👉🏻 {} (available: {})", m.display_name, m.available);
            if let Some(price) = &m.price {
                let _ = write!(lines, " · {price}");
            }
            if let Some(window) = m.pickup_window() {
                let _ = write!(lines, " · pickup {window}");
            }
            lines.push('\n');
        }

        if notified > 0 {
            info!(notified, "New matches");
            let options = self.account.store().config().notifications.for_matches();
            self.notify(&format!("Got following matches:\n{lines}"), &options)
                .await;
        }
        notified
    }

    /// Sends the stopped message and persists the watching flag.
    ///
    /// On shutdown the flag stays set so the next start resumes the loop.
    pub async fn finish(&mut self, reason: StopReason) -> Result<(), WatchError> {
        info!(user = %self.account.user_id(), ?reason, "Watch stopped");
        if reason == StopReason::Shutdown {
            return Ok(());
        }
        self.seen.clear();
        self.hold = None;
        self.account
            .store_mut()
            .update(|c| c.watching = false)
            .await?;
        self.notify_status("Stopped watching the favourites.").await;
        Ok(())
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Cancellation handles of one loop.
#[derive(Debug, Clone)]
pub struct LoopControl {
    /// Cancelled to stop this user's loop.
    pub stop: CancellationToken,
    /// Cancelled when the whole process shuts down.
    pub shutdown: CancellationToken,
}

impl LoopControl {
    /// Control whose stop token is a child of `shutdown`.
    pub fn child_of(shutdown: &CancellationToken) -> Self {
        Self {
            stop: shutdown.child_token(),
            shutdown: shutdown.clone(),
        }
    }

    fn reason(&self) -> StopReason {
        if self.shutdown.is_cancelled() {
            StopReason::Shutdown
        } else {
            StopReason::Requested
        }
    }
}

/// Ticks until stopped.
///
/// # Errors
///
/// Returns the unclassified error that crashed the loop. A crashed loop does
/// not touch the watching flag so the supervisor can restart it.
pub async fn run_watch_loop(
    user: Arc<Mutex<UserWatch>>,
    control: LoopControl,
) -> Result<StopReason, WatchError> {
    let user_id = user.lock().await.user_id().to_string();
    info!(user = %user_id, "Watch loop started");

    let reason = loop {
        if control.stop.is_cancelled() {
            break control.reason();
        }

        let started = Instant::now();
        let (outcome, limits) = {
            let mut watch = user.lock().await;
            (watch.tick().await, watch.limits().clone())
        };

        match outcome {
            Ok(TickOutcome::Stop(reason)) => break reason,
            Ok(outcome) => debug!(user = %user_id, ?outcome, "Tick done"),
            Err(e) => {
                error!(user = %user_id, error = %e, "Watch loop crashed");
                return Err(e);
            }
        }

        let sleep = next_sleep(
            limits.interval,
            started.elapsed(),
            limits.jitter,
            &mut rand::thread_rng(),
        );
        tokio::select! {
            () = control.stop.cancelled() => break control.reason(),
            () = tokio::time::sleep(sleep) => {}
        }
    };

    user.lock().await.finish(reason).await?;
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_next_sleep_subtracts_elapsed() {
        let mut rng = StdRng::seed_from_u64(1);
        let sleep = next_sleep(Duration::from_secs(15), Duration::from_secs(5), 0.0, &mut rng);
        assert_eq!(sleep, Duration::from_secs(10));
    }

    #[test]
    fn test_next_sleep_never_negative() {
        let mut rng = StdRng::seed_from_u64(2);
        let sleep = next_sleep(Duration::from_secs(15), Duration::from_secs(20), 0.1, &mut rng);
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn test_next_sleep_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let sleep = next_sleep(Duration::from_secs(10), Duration::ZERO, 0.1, &mut rng);
            assert!(sleep >= Duration::from_millis(8_999), "{sleep:?}");
            assert!(sleep <= Duration::from_millis(11_001), "{sleep:?}");
        }
    }

    #[test]
    fn test_limits_interval_override() {
        let settings = AppSettings::default();
        assert_eq!(
            WatchLimits::from_settings(&settings, None).interval,
            Duration::from_secs(15)
        );
        assert_eq!(
            WatchLimits::from_settings(&settings, Some(30.0)).interval,
            Duration::from_secs(30)
        );
        assert_eq!(
            WatchLimits::from_settings(&settings, Some(-1.0)).interval,
            Duration::from_secs(15)
        );
        assert_eq!(
            WatchLimits::from_settings(&settings, Some(1e20)).interval,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_next_sleep_jitter_on_huge_interval() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let sleep = next_sleep(Duration::MAX, Duration::ZERO, 0.5, &mut rng);
            assert!(sleep > Duration::from_secs(1));
        }
    }
}
