//! Background health monitor.
//!
//! Probes the backend's health endpoint on a timer, independent of
//! user-triggered traffic, and feeds the verdict to the status publisher.
//! Probes deliberately bypass the backoff executor: a single failed probe
//! flips health to unhealthy immediately, and the next tick is the retry.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, trace};

use pulselink_core::config::LinkConfig;
use pulselink_core::request::RequestDescriptor;

use crate::publisher::StatusPublisher;
use crate::transport::HttpTransport;

/// Periodic liveness prober for the backend.
pub struct HealthMonitor {
    transport: Arc<dyn HttpTransport>,
    publisher: Arc<StatusPublisher>,
    config: LinkConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("running", &self.is_running())
            .field("interval", &self.config.health_check_interval)
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Create a monitor probing through the given transport.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        publisher: Arc<StatusPublisher>,
        config: LinkConfig,
    ) -> Self {
        Self {
            transport,
            publisher,
            config,
            task: Mutex::new(None),
        }
    }

    /// Begin probing: one immediate probe, then one per configured interval.
    /// Idempotent; a second `start` while running is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let transport = self.transport.clone();
        let publisher = self.publisher.clone();
        let probe_path = self.config.health_path.clone();
        let probe_interval = self.config.health_check_interval;
        let probe_timeout = self.config.health_check_timeout;

        debug!("Health monitor started (interval {probe_interval:?})");

        *task = Some(tokio::spawn(async move {
            // The first tick completes immediately.
            let mut ticker = interval(probe_interval);
            loop {
                ticker.tick().await;

                let request = RequestDescriptor::get(&*probe_path).with_timeout(probe_timeout);
                // Single attempt, no retries; timeouts, network errors and
                // non-2xx responses are all equally "unhealthy" here.
                let healthy = matches!(
                    timeout(probe_timeout, transport.execute(&request)).await,
                    Ok(Ok(_))
                );
                trace!("Health probe: healthy={healthy}");
                publisher.set_backend_healthy(healthy);
            }
        }));
    }

    /// Stop probing. Cancels the timer synchronously; no probe fires after
    /// this returns.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            debug!("Health monitor stopped");
        }
    }

    /// Whether the probe task is currently running.
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
