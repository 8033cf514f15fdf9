//! Process-wide settings.

use std::path::Path;
use std::time::Duration;

use bagwatch_fetch::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{load_json, save_json, settings_path};

/// Longest polling interval accepted from settings, user configs, or flags.
pub const MAX_WATCH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const FALLBACK_WATCH_INTERVAL: Duration = Duration::from_secs(15);

/// Converts a polling interval in seconds.
///
/// Returns `None` for negative or non-finite values and for anything above
/// [`MAX_WATCH_INTERVAL`].
pub fn watch_interval_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| *d <= MAX_WATCH_INTERVAL)
}

/// Settings shared by every user of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Marketplace API root.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Polling interval for users without an override.
    pub default_watch_interval_secs: f64,
    /// Requests allowed between two refreshes.
    pub max_requests: u64,
    /// Consecutive failures that trigger recovery.
    pub max_failed_requests: u32,
    /// Period of the resurrection scan.
    pub supervisor_interval_secs: u64,
    /// Attempts of the login poll.
    pub auth_poll_attempts: u32,
    /// Delay between login poll attempts.
    pub auth_poll_delay_secs: u64,
    /// Items requested per favourites page.
    pub page_size: u32,
    /// Page-count ceiling of one favourites scan.
    pub max_pages: u32,
    /// Relative jitter applied to each sleep.
    pub jitter: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
            default_watch_interval_secs: 15.0,
            max_requests: 10_000,
            max_failed_requests: 3,
            supervisor_interval_secs: 60,
            auth_poll_attempts: 10,
            auth_poll_delay_secs: 10,
            page_size: 50,
            max_pages: 20,
            jitter: 0.10,
        }
    }
}

impl AppSettings {
    /// Loads `settings.json` under `config_dir`; defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(config_dir: &Path) -> Result<Self, StoreError> {
        let path = settings_path(config_dir);
        match load_json::<AppSettings>(&path).await {
            Ok(settings) => {
                info!(path = %path.display(), "Loaded settings");
                Ok(settings.sanitized())
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "Settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the settings under `config_dir`.
    pub async fn save(&self, config_dir: &Path) -> Result<(), StoreError> {
        save_json(&settings_path(config_dir), self).await
    }

    /// Replaces values that would stall or break the loop.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.page_size == 0 {
            warn!("page_size must be positive, using default");
            self.page_size = defaults.page_size;
        }
        if self.max_pages == 0 {
            warn!("max_pages must be positive, using default");
            self.max_pages = defaults.max_pages;
        }
        if watch_interval_from_secs(self.default_watch_interval_secs).is_none() {
            warn!("default_watch_interval_secs must be between 0 and one day, using default");
            self.default_watch_interval_secs = defaults.default_watch_interval_secs;
        }
        if !self.jitter.is_finite() || !(0.0..1.0).contains(&self.jitter) {
            warn!("jitter must be in [0, 1), using default");
            self.jitter = defaults.jitter;
        }
        self
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Default polling interval.
    pub fn default_watch_interval(&self) -> Duration {
        watch_interval_from_secs(self.default_watch_interval_secs).unwrap_or(FALLBACK_WATCH_INTERVAL)
    }

    /// Resurrection scan period.
    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_secs(self.supervisor_interval_secs.max(1))
    }

    /// Delay between login poll attempts.
    pub fn auth_poll_delay(&self) -> Duration {
        Duration::from_secs(self.auth_poll_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_bounds() {
        assert_eq!(watch_interval_from_secs(0.5), Some(Duration::from_millis(500)));
        assert_eq!(watch_interval_from_secs(86_400.0), Some(MAX_WATCH_INTERVAL));
        assert_eq!(watch_interval_from_secs(86_400.5), None);
        assert_eq!(watch_interval_from_secs(1e20), None);
        assert_eq!(watch_interval_from_secs(-1.0), None);
        assert_eq!(watch_interval_from_secs(f64::NAN), None);
    }

    #[test]
    fn test_huge_default_interval_is_sanitized() {
        let settings = AppSettings {
            default_watch_interval_secs: 1e20,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.default_watch_interval(), Duration::from_secs(15));

        let unsanitized = AppSettings {
            default_watch_interval_secs: 1e20,
            ..Default::default()
        };
        assert_eq!(unsanitized.default_watch_interval(), Duration::from_secs(15));
    }
}
