//! Backoff executor: a single request with bounded retries.

use tracing::{debug, warn};

use pulselink_core::error::LinkResult;
use pulselink_core::request::{ApiResponse, RequestDescriptor};
use pulselink_core::retry::RetryPolicy;

use crate::transport::HttpTransport;

/// Execute one request with exponential-backoff retries.
///
/// Attempt numbering starts at 0; the policy allows up to `max_retries`
/// additional attempts after the first. Retry eligibility comes from the
/// error's classification (network failure, 5xx, 408, 429); any other
/// failure, or exhaustion of the retry budget, surfaces the last underlying
/// error untouched. Stateless across calls.
pub async fn execute_with_retry(
    transport: &dyn HttpTransport,
    request: &RequestDescriptor,
    policy: &RetryPolicy,
) -> LinkResult<ApiResponse> {
    let mut attempt: u32 = 0;
    loop {
        match transport.execute(request).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                if !err.is_retryable() || !policy.should_retry(attempt) {
                    if attempt > 0 {
                        warn!(
                            "{} {} failed after {} attempts: {err}",
                            request.method().as_str(),
                            request.path(),
                            attempt + 1
                        );
                    }
                    return Err(err);
                }

                let delay = policy.delay(attempt);
                debug!(
                    "{} {} attempt {} failed ({err}), retrying in {delay:?}",
                    request.method().as_str(),
                    request.path(),
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulselink_core::error::LinkError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Transport that fails with scripted statuses before succeeding.
    struct ScriptedTransport {
        attempts: AtomicU32,
        failures: Vec<u16>,
    }

    impl ScriptedTransport {
        fn failing_with(failures: Vec<u16>) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                failures,
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, _request: &RequestDescriptor) -> LinkResult<ApiResponse> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) as usize;
            match self.failures.get(n) {
                Some(&status) => Err(LinkError::from_status(status, b"scripted")),
                None => Ok(ApiResponse::new(200, Vec::new(), bytes::Bytes::new())),
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(10))
            .with_jitter(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_until_success() {
        let transport = ScriptedTransport::failing_with(vec![503, 503]);
        let request = RequestDescriptor::get("/cases");

        let response = execute_with_retry(&transport, &request, &fast_policy())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_the_last_error() {
        let transport = ScriptedTransport::failing_with(vec![500, 502, 503, 429, 500]);
        let request = RequestDescriptor::get("/cases");
        let policy = fast_policy();

        let err = execute_with_retry(&transport, &request, &policy)
            .await
            .unwrap_err();

        // maxRetries + 1 total attempts; last error (429) surfaced, not a
        // synthetic exhaustion error.
        assert_eq!(transport.attempts(), 4);
        assert_eq!(err.status(), Some(429));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_client_errors_never_retry() {
        for status in [400, 401, 403, 404] {
            let transport = ScriptedTransport::failing_with(vec![status]);
            let request = RequestDescriptor::get("/cases");

            let err = execute_with_retry(&transport, &request, &fast_policy())
                .await
                .unwrap_err();

            assert_eq!(transport.attempts(), 1, "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_and_throttling_statuses_are_retried() {
        for status in [408, 429] {
            let transport = ScriptedTransport::failing_with(vec![status]);
            let request = RequestDescriptor::get("/cases");

            let response = execute_with_retry(&transport, &request, &fast_policy())
                .await
                .unwrap();

            assert_eq!(response.status(), 200, "status {status}");
            assert_eq!(transport.attempts(), 2, "status {status}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn inter_attempt_delays_grow_exponentially() {
        let transport = ScriptedTransport::failing_with(vec![503, 503, 503]);
        let request = RequestDescriptor::get("/cases");
        let policy = fast_policy();

        let started = tokio::time::Instant::now();
        let _ = execute_with_retry(&transport, &request, &policy).await;

        // 10ms + 20ms + 40ms of scheduled sleep under the paused clock.
        assert_eq!(started.elapsed(), Duration::from_millis(70));
    }
}
