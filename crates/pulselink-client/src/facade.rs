//! Public entry point: the resilient client facade.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use pulselink_auth::TokenStore;
use pulselink_core::config::LinkConfig;
use pulselink_core::error::{LinkError, LinkResult};
use pulselink_core::request::{ApiResponse, RequestDescriptor};
use pulselink_core::status::ConnectionStatus;

use crate::executor::execute_with_retry;
use crate::health::HealthMonitor;
use crate::publisher::{StatusPublisher, SubscriptionGuard};
use crate::queue::OfflineQueue;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Single entry point for resilient backend requests.
///
/// Routes each request by connectivity: online requests go straight through
/// the backoff executor; offline requests park in the FIFO queue and settle
/// whenever connectivity returns. The facade itself never retries across the
/// online/offline boundary; that hand-off belongs to the queue and the
/// status publisher.
///
/// Must be used from within a tokio runtime: connectivity transitions and
/// the health monitor spawn background tasks.
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    queue: Arc<OfflineQueue>,
    publisher: Arc<StatusPublisher>,
    monitor: HealthMonitor,
    tokens: Option<Arc<TokenStore>>,
    config: LinkConfig,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Create a client with the reqwest transport and no authentication.
    pub fn new(config: LinkConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.clone()));
        Self::assemble(config, transport, None)
    }

    /// Create a client whose requests carry bearer tokens from the store.
    pub fn with_token_store(config: LinkConfig, tokens: Arc<TokenStore>) -> Self {
        let transport = Arc::new(ReqwestTransport::with_token_store(
            config.clone(),
            tokens.clone(),
        ));
        Self::assemble(config, transport, Some(tokens))
    }

    /// Create a client over a custom transport. Used by tests and by
    /// embedders with their own HTTP stack.
    pub fn with_transport(
        config: LinkConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: Option<Arc<TokenStore>>,
    ) -> Self {
        Self::assemble(config, transport, tokens)
    }

    fn assemble(
        config: LinkConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: Option<Arc<TokenStore>>,
    ) -> Self {
        let queue = Arc::new(OfflineQueue::new(config.retry.clone()));
        let publisher = Arc::new(StatusPublisher::new(queue.clone()));
        let monitor = HealthMonitor::new(transport.clone(), publisher.clone(), config.clone());
        Self {
            transport,
            queue,
            publisher,
            monitor,
            tokens,
            config,
        }
    }

    /// Issue a request through the resilience pipeline.
    ///
    /// Offline: the request is queued and this call waits, without a
    /// timeout, for the queue to eventually process it. Online: the backoff
    /// executor runs it with the configured retry ceiling.
    pub async fn request(&self, request: RequestDescriptor) -> LinkResult<ApiResponse> {
        if !self.publisher.is_online() {
            debug!(
                "Offline, queuing {} {}",
                request.method().as_str(),
                request.path()
            );
            let settled = self.queue.enqueue(request.clone());
            let result = settled.await.map_err(|_| LinkError::QueueClosed)?;
            return self.replay_after_refresh(request, result).await;
        }

        let result = execute_with_retry(&*self.transport, &request, &self.config.retry).await;
        self.replay_after_refresh(request, result).await
    }

    /// One replay after a 401 when a forced token refresh succeeds. The
    /// refresh is a single best-effort attempt; a second 401 surfaces.
    async fn replay_after_refresh(
        &self,
        request: RequestDescriptor,
        result: LinkResult<ApiResponse>,
    ) -> LinkResult<ApiResponse> {
        let Err(err) = &result else {
            return result;
        };
        if !self.config.retry_on_unauthorized || err.status() != Some(401) {
            return result;
        }
        let Some(tokens) = &self.tokens else {
            return result;
        };

        if tokens.force_refresh().await {
            info!(
                "Replaying {} {} after token refresh",
                request.method().as_str(),
                request.path()
            );
            execute_with_retry(&*self.transport, &request, &self.config.retry).await
        } else {
            result
        }
    }

    /// Record a connectivity change from the host environment. A rising
    /// edge (offline to online) kicks off a background queue drain.
    pub fn set_online(&self, online: bool) {
        let changed = self.publisher.set_online(online);
        if changed && online {
            let queue = self.queue.clone();
            let transport = self.transport.clone();
            let publisher = self.publisher.clone();
            tokio::spawn(async move {
                queue
                    .drain(&*transport, move || publisher.is_online())
                    .await;
            });
        }
    }

    /// Synchronous status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.publisher.status()
    }

    /// Subscribe to status changes as a channel consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.publisher.subscribe()
    }

    /// Subscribe to status changes with a callback; the guard unsubscribes
    /// on drop.
    pub fn on_change(
        &self,
        callback: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        self.publisher.on_change(callback)
    }

    /// Start the background health monitor (idempotent).
    pub fn start_health_monitor(&self) {
        self.monitor.start();
    }

    /// Stop the background health monitor.
    pub fn stop_health_monitor(&self) {
        self.monitor.stop();
    }

    /// The shared status publisher, for wiring into other components.
    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }
}
