//! Per-user request and failure counters.

/// Counters bounding total requests and consecutive failures.
///
/// Never persisted; a fresh set is created with every transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaCounters {
    /// Requests issued since the last successful refresh.
    pub requests_since_refresh: u64,
    /// Failed requests since the last successful one.
    pub consecutive_failures: u32,
}

impl QuotaCounters {
    pub(crate) fn record_request(&mut self) {
        self.requests_since_refresh = self.requests_since_refresh.saturating_add(1);
    }

    pub(crate) fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// True once `requests_since_refresh` is past `ceiling`.
    pub fn requests_exceeded(&self, ceiling: u64) -> bool {
        self.requests_since_refresh > ceiling
    }

    /// True once `consecutive_failures` reached `threshold`.
    pub fn failures_exceeded(&self, threshold: u32) -> bool {
        threshold > 0 && self.consecutive_failures >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_threshold() {
        let mut counters = QuotaCounters::default();
        counters.record_failure();
        counters.record_failure();
        assert!(!counters.failures_exceeded(3));
        counters.record_failure();
        assert!(counters.failures_exceeded(3));
        counters.record_success();
        assert_eq!(counters.consecutive_failures, 0);
    }

    #[test]
    fn test_request_ceiling_is_exclusive() {
        let counters = QuotaCounters {
            requests_since_refresh: 10,
            consecutive_failures: 0,
        };
        assert!(!counters.requests_exceeded(10));
        assert!(counters.requests_exceeded(9));
    }
}
