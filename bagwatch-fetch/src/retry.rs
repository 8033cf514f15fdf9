//! Backoff schedules for polling loops.

use std::time::Duration;

/// Schedule for repeating a request that is not ready yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Whether to double the delay after every attempt.
    pub exponential_backoff: bool,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetrySchedule {
    /// Creates an exponential schedule starting at one second.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
            exponential_backoff: true,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Creates a schedule with a constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            exponential_backoff: false,
            max_delay: delay,
        }
    }

    /// A single attempt without waiting.
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Calculates the delay after a given attempt number (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        };

        delay.min(self.max_delay)
    }
}

impl Default for RetrySchedule {
    /// Ten attempts, ten seconds apart.
    fn default() -> Self {
        Self::fixed(10, Duration::from_secs(10))
    }
}
