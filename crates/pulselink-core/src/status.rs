//! Connection status snapshot and change notification.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Snapshot of the link's health as seen by the client.
///
/// `queued_requests` is derived from the live offline-queue length at the
/// moment the snapshot is taken; it is never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the host believes it has network connectivity.
    pub is_online: bool,
    /// Whether the last health probe against the backend succeeded.
    pub is_backend_healthy: bool,
    /// Requests currently parked in the offline queue.
    pub queued_requests: usize,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        // Headless contexts have no connectivity events; assume online so the
        // pipeline degrades to plain retry behavior instead of queuing forever.
        Self {
            is_online: true,
            is_backend_healthy: true,
            queued_requests: 0,
        }
    }
}

/// Broadcasts [`ConnectionStatus`] changes to any number of subscribers.
///
/// Every subscriber receives every change; subscriber counts are expected to
/// be small (status badges, queue indicators), so no filtering or
/// backpressure is applied. Emission never blocks.
#[derive(Debug, Clone)]
pub struct StatusEmitter {
    sender: broadcast::Sender<ConnectionStatus>,
}

impl StatusEmitter {
    /// Create a new emitter.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.sender.subscribe()
    }

    /// Emit a status change. Silently dropped when nobody is listening.
    pub fn emit(&self, status: ConnectionStatus) {
        let _ = self.sender.send(status);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusEmitter {
    fn default() -> Self {
        Self::new()
    }
}
