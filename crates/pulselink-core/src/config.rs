//! Configuration for the resilient request pipeline.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Tuning knobs for the HTTP side of the access layer.
///
/// Built with `with_*` methods; every field has a default suited to a flaky
/// wide-area link, and all of them are overridable by the embedding
/// application.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Backend base URL, e.g. `https://ops.pulselogic.mil/api`.
    pub base_url: String,

    /// Health probe path, relative to the base URL.
    pub health_path: String,

    /// Interval between background health probes.
    pub health_check_interval: Duration,

    /// Timeout for a single health probe.
    pub health_check_timeout: Duration,

    /// Retry policy applied by the backoff executor.
    pub retry: RetryPolicy,

    /// Default per-attempt request timeout. Individual requests may override
    /// it on their descriptor.
    pub request_timeout: Duration,

    /// Device identifier sent as `X-Device-ID` on every request, used by the
    /// backend for per-unit audit trails.
    pub device_id: Option<String>,

    /// Replay a request once after a 401 if a token refresh succeeds.
    pub retry_on_unauthorized: bool,
}

impl LinkConfig {
    /// Create a configuration for the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            health_path: "/health".to_string(),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            device_id: None,
            retry_on_unauthorized: true,
        }
    }

    /// Set the health probe path.
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Set the health probe interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the health probe timeout.
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default per-attempt request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the device identifier.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Enable or disable the single 401 replay after a successful refresh.
    pub fn with_retry_on_unauthorized(mut self, enabled: bool) -> Self {
        self.retry_on_unauthorized = enabled;
        self
    }

    /// Full URL for the health probe.
    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }

    /// Full URL for a backend-relative path.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
