//! Connection status publisher.
//!
//! Merges the host's connectivity signal and the health monitor's verdict
//! into one observable [`ConnectionStatus`]. Both flags are edge-triggered:
//! subscribers hear about changes, not about every observation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use pulselink_core::status::{ConnectionStatus, StatusEmitter};

use crate::queue::OfflineQueue;

type Callback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
type CallbackRegistry = Arc<Mutex<Vec<(u64, Callback)>>>;

/// Single-instance status context shared by the facade, the health monitor,
/// and any number of subscribers.
///
/// With no connectivity events wired up (headless hosts), the online flag
/// starts `true` and never flips: the pipeline degrades to plain retry
/// behavior rather than queuing forever.
pub struct StatusPublisher {
    online: AtomicBool,
    backend_healthy: AtomicBool,
    queue: Arc<OfflineQueue>,
    emitter: StatusEmitter,
    callbacks: CallbackRegistry,
    next_callback_id: AtomicU64,
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Keeps a callback subscription alive; dropping it unsubscribes.
pub struct SubscriptionGuard {
    registry: CallbackRegistry,
    id: u64,
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.lock().retain(|(id, _)| *id != self.id);
    }
}

impl StatusPublisher {
    /// Create a publisher reading queue depth from the given queue.
    pub fn new(queue: Arc<OfflineQueue>) -> Self {
        Self {
            online: AtomicBool::new(true),
            backend_healthy: AtomicBool::new(true),
            queue,
            emitter: StatusEmitter::new(),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            next_callback_id: AtomicU64::new(0),
        }
    }

    /// Synchronous snapshot of the current status. Never blocks; reflects
    /// the most recently observed edges even with no subscribers registered.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            is_online: self.online.load(Ordering::SeqCst),
            is_backend_healthy: self.backend_healthy.load(Ordering::SeqCst),
            queued_requests: self.queue.len(),
        }
    }

    /// Whether the host currently believes it is online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Subscribe as a channel consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.emitter.subscribe()
    }

    /// Subscribe with a callback; the returned guard unsubscribes on drop.
    pub fn on_change(
        &self,
        callback: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        let id = self.next_callback_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().push((id, Arc::new(callback)));
        SubscriptionGuard {
            registry: self.callbacks.clone(),
            id,
        }
    }

    /// Record a connectivity edge from the host environment. Returns `true`
    /// when the value actually changed (the caller uses a rising edge to
    /// kick off a queue drain).
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!("Connectivity changed: online={online}");
            self.notify();
        }
        previous != online
    }

    /// Record the health monitor's verdict. Edge-triggered: subscribers are
    /// notified only when the verdict changes.
    pub fn set_backend_healthy(&self, healthy: bool) -> bool {
        let previous = self.backend_healthy.swap(healthy, Ordering::SeqCst);
        if previous != healthy {
            info!("Backend health changed: healthy={healthy}");
            self.notify();
        }
        previous != healthy
    }

    fn notify(&self) {
        let status = self.status();
        self.emitter.emit(status);
        // Invoke outside the lock: a callback may subscribe, unsubscribe, or
        // flip a flag itself, and the registry mutex is not reentrant.
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(status);
        }
    }
}
