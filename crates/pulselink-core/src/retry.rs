//! Retry policy with exponential backoff and jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy for one-shot request retries.
///
/// Attempt numbering starts at 0: after attempt `n` fails retryably, the
/// executor sleeps `base_delay * 2^n` plus a uniform random jitter before
/// attempt `n + 1`. The jitter keeps a platoon of clients reconnecting after
/// the same outage from hammering the backend in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first (3 retries = 4 total attempts).
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy tuned for high-latency satellite links: fewer, slower retries
    /// so a congested uplink is not made worse.
    pub fn for_satellite() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(3000),
            jitter: Duration::from_millis(1500),
        }
    }

    /// Set the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the jitter bound.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to sleep after failed attempt `attempt` (0-based), jitter
    /// included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let backoff = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            fastrand::u64(0..jitter_ms)
        } else {
            0
        };
        Duration::from_millis(backoff.saturating_add(jitter))
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_field_tuning() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.jitter, Duration::from_millis(500));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default().with_jitter(Duration::ZERO);
        assert_eq!(policy.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.delay(1), Duration::from_millis(2000));
        assert_eq!(policy.delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let d = policy.delay(attempt);
            let floor = 1000u64 << attempt;
            assert!(d.as_millis() as u64 >= floor);
            assert!((d.as_millis() as u64) < floor + 500);
        }
    }

    #[test]
    fn retry_window_is_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(10));
    }

    #[test]
    fn huge_attempt_index_does_not_overflow() {
        let policy = RetryPolicy::default().with_jitter(Duration::ZERO);
        // Saturates instead of panicking.
        let _ = policy.delay(u32::MAX);
    }
}
