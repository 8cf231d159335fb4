//! Offline request queue with FIFO replay.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use pulselink_core::error::LinkResult;
use pulselink_core::request::{ApiResponse, RequestDescriptor};
use pulselink_core::retry::RetryPolicy;

use crate::executor::execute_with_retry;
use crate::transport::HttpTransport;

struct QueuedEntry {
    request: RequestDescriptor,
    settle: oneshot::Sender<LinkResult<ApiResponse>>,
}

/// Buffers requests issued while the link is down and replays them in order
/// once connectivity returns.
///
/// Memory-resident only: a process restart loses queued requests. The queue
/// is unbounded; embedders who care should watch `queued_requests` in the
/// published status. Entries settle exactly once and are never re-queued
/// after a terminal failure.
pub struct OfflineQueue {
    entries: Mutex<VecDeque<QueuedEntry>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("len", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl OfflineQueue {
    /// Create a queue whose drained entries run under the given retry policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            policy,
        }
    }

    /// Park a request until the next drain. The returned receiver settles
    /// with the request's eventual outcome; there is no upper bound on how
    /// long that takes.
    pub fn enqueue(
        &self,
        request: RequestDescriptor,
    ) -> oneshot::Receiver<LinkResult<ApiResponse>> {
        let (settle, rx) = oneshot::channel();
        let mut entries = self.entries.lock();
        entries.push_back(QueuedEntry { request, settle });
        debug!("Request queued offline ({} waiting)", entries.len());
        rx
    }

    /// Number of parked requests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Replay parked requests in FIFO order through the backoff executor.
    ///
    /// Each entry settles with its own success or terminal failure and the
    /// drain moves on either way. `is_online` is consulted before every pop;
    /// when it flips false mid-drain the remaining entries stay parked for
    /// the next online transition.
    pub async fn drain(&self, transport: &dyn HttpTransport, is_online: impl Fn() -> bool) {
        let mut drained = 0usize;
        loop {
            if !is_online() {
                debug!("Link dropped mid-drain, {} requests still queued", self.len());
                break;
            }
            let Some(entry) = self.entries.lock().pop_front() else {
                break;
            };
            let result = execute_with_retry(transport, &entry.request, &self.policy).await;
            // The caller may have given up waiting; a dropped receiver is fine.
            let _ = entry.settle.send(result);
            drained += 1;
        }
        if drained > 0 {
            info!("Offline queue drained {drained} requests");
        }
    }
}
