//! Duplex channel configuration.

use std::time::Duration;

/// Reconnection policy for the duplex channel.
///
/// Delay before reconnect attempt `n` (0-based) is
/// `min(base_delay * 2^n, max_delay)` plus uniform jitter. Attempts stop
/// permanently once `max_retries` reconnects have been scheduled without an
/// intervening successful open.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Initial reconnect delay.
    pub base_delay: Duration,
    /// Cap on the exponential delay (jitter excluded).
    pub max_delay: Duration,
    /// Reconnect attempts allowed before giving up permanently.
    pub max_retries: u32,
    /// Upper bound (exclusive) of the uniform jitter added to each delay.
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_retries: 10,
            jitter: Duration::from_millis(1000),
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the reconnect ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the jitter bound.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before reconnect attempt `retry_count` (0-based), jitter
    /// included.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let backoff = base_ms
            .saturating_mul(2u64.saturating_pow(retry_count))
            .min(self.max_delay.as_millis() as u64);
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            fastrand::u64(0..jitter_ms)
        } else {
            0
        };
        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

/// Configuration for one duplex channel.
#[derive(Debug, Clone)]
pub struct DuplexConfig {
    /// WebSocket URL to connect to.
    pub url: String,
    /// Optional subprotocols offered during the handshake.
    pub protocols: Vec<String>,
    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl DuplexConfig {
    /// Create a configuration for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Offer a subprotocol during the handshake.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Set the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_tuning() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert_eq!(policy.max_retries, 10);
    }

    #[test]
    fn delay_doubles_then_caps() {
        let policy = ReconnectPolicy::default().with_jitter(Duration::ZERO);
        assert_eq!(policy.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.delay(1), Duration::from_millis(2000));
        assert_eq!(policy.delay(4), Duration::from_millis(16_000));
        // 2^5 = 32s exceeds the 30s cap.
        assert_eq!(policy.delay(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay(20), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = ReconnectPolicy::default();
        for retry in 0..4 {
            let d = policy.delay(retry).as_millis() as u64;
            let floor = 1000u64 << retry;
            assert!(d >= floor);
            assert!(d < floor + 1000);
        }
    }
}
