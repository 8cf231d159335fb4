//! Auto-reconnecting duplex channel manager.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DuplexConfig;
use crate::dial::{Dialer, Frame, FrameSink, FrameSource, TungsteniteDialer};

/// Lifecycle state of the duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexState {
    /// Never connected.
    Idle,
    /// Dial in progress.
    Connecting,
    /// Connection established.
    Open,
    /// Closed unintentionally; a reconnect timer is pending.
    Reconnecting,
    /// Closed by explicit `disconnect()`; no reconnects until `connect()`.
    Closed,
    /// Reconnect ceiling reached; permanently stopped.
    Exhausted,
}

/// Lifecycle and message events delivered to the channel's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplexEvent {
    /// Connection established (initial or after reconnect).
    Open,
    /// Inbound text frame.
    Text(String),
    /// Inbound binary frame.
    Binary(bytes::Bytes),
    /// Connection closed (intentionally or not).
    Closed,
    /// Dial or transport failure. Informational; reconnection is handled
    /// internally and send-side callers never see these as errors.
    Error(String),
}

/// Manages one persistent duplex connection with exponential-backoff
/// reconnection.
///
/// Outbound frames are silently dropped unless the connection is currently
/// open; this layer does not buffer duplex traffic across disconnects (the
/// offline queue in `pulselink-client` is deliberately asymmetric here).
pub struct DuplexManager {
    config: DuplexConfig,
    dialer: Arc<dyn Dialer>,
    state: Arc<RwLock<DuplexState>>,
    connected: Arc<AtomicBool>,
    intentional_close: Arc<AtomicBool>,
    events_tx: mpsc::Sender<DuplexEvent>,
    outbound_tx: Mutex<Option<mpsc::Sender<Frame>>>,
    shutdown_tx: broadcast::Sender<()>,
    redial: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DuplexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexManager")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DuplexManager {
    /// Create a manager using the production WebSocket dialer. Returns the
    /// manager and the event stream its consumer reads from.
    pub fn new(config: DuplexConfig) -> (Self, mpsc::Receiver<DuplexEvent>) {
        Self::with_dialer(config, Arc::new(TungsteniteDialer))
    }

    /// Create a manager over a custom dialer (tests, alternative stacks).
    pub fn with_dialer(
        config: DuplexConfig,
        dialer: Arc<dyn Dialer>,
    ) -> (Self, mpsc::Receiver<DuplexEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = broadcast::channel(4);
        let manager = Self {
            config,
            dialer,
            state: Arc::new(RwLock::new(DuplexState::Idle)),
            connected: Arc::new(AtomicBool::new(false)),
            intentional_close: Arc::new(AtomicBool::new(false)),
            events_tx,
            outbound_tx: Mutex::new(None),
            shutdown_tx,
            redial: Arc::new(Notify::new()),
            task: Mutex::new(None),
        };
        (manager, events_rx)
    }

    /// Open the connection and keep it open. Resets the retry budget and
    /// clears any previous intentional close. No-op while the connection is
    /// open or a dial is in flight; during a pending reconnect backoff it
    /// skips the remaining wait and dials again with a fresh budget.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            if *self.state.read() == DuplexState::Reconnecting {
                self.redial.notify_one();
            }
            return;
        }

        self.intentional_close.store(false, Ordering::SeqCst);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        *self.outbound_tx.lock() = Some(outbound_tx);
        // Subscribe before spawning so a disconnect() racing the spawn is
        // still observed.
        let shutdown_rx = self.shutdown_tx.subscribe();

        let runner = Runner {
            config: self.config.clone(),
            dialer: self.dialer.clone(),
            state: self.state.clone(),
            connected: self.connected.clone(),
            intentional_close: self.intentional_close.clone(),
            events_tx: self.events_tx.clone(),
            redial: self.redial.clone(),
        };
        *task = Some(tokio::spawn(runner.run(outbound_rx, shutdown_rx)));
    }

    /// Close the connection and stop reconnecting. Any pending reconnect
    /// timer is cancelled; it will not fire after this call.
    pub fn disconnect(&self) {
        self.intentional_close.store(true, Ordering::SeqCst);
        *self.outbound_tx.lock() = None;
        let _ = self.shutdown_tx.send(());
        debug!("Duplex disconnect requested");
    }

    /// Send a frame if the connection is open; silently dropped otherwise.
    pub fn send(&self, frame: Frame) {
        if !self.connected.load(Ordering::SeqCst) {
            debug!("Dropping outbound frame, duplex channel not open");
            return;
        }
        if let Some(tx) = &*self.outbound_tx.lock() {
            match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound duplex buffer full, dropping frame");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Duplex channel closing, dropping frame");
                }
            }
        }
    }

    /// Send a text frame if the connection is open.
    pub fn send_text(&self, text: impl Into<String>) {
        self.send(Frame::Text(text.into()));
    }

    /// Whether the connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DuplexState {
        *self.state.read()
    }
}

impl Drop for DuplexManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// State captured by the background connection task.
struct Runner {
    config: DuplexConfig,
    dialer: Arc<dyn Dialer>,
    state: Arc<RwLock<DuplexState>>,
    connected: Arc<AtomicBool>,
    intentional_close: Arc<AtomicBool>,
    events_tx: mpsc::Sender<DuplexEvent>,
    redial: Arc<Notify>,
}

impl Runner {
    fn emit(&self, event: DuplexEvent) {
        // Consumers that stopped reading shouldn't wedge the connection.
        let _ = self.events_tx.try_send(event);
    }

    fn set_state(&self, state: DuplexState) {
        *self.state.write() = state;
    }

    async fn run(
        self,
        mut outbound_rx: mpsc::Receiver<Frame>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut retry_count: u32 = 0;

        loop {
            if self.intentional_close.load(Ordering::SeqCst) {
                self.set_state(DuplexState::Closed);
                return;
            }

            self.set_state(DuplexState::Connecting);
            let dialed = tokio::select! {
                result = self.dialer.dial(&self.config.url, &self.config.protocols) => result,
                _ = shutdown_rx.recv() => {
                    self.set_state(DuplexState::Closed);
                    return;
                }
            };

            match dialed {
                Ok((mut sink, mut source)) => {
                    retry_count = 0;
                    self.connected.store(true, Ordering::SeqCst);
                    self.set_state(DuplexState::Open);
                    self.emit(DuplexEvent::Open);
                    info!("Duplex channel open: {}", self.config.url);

                    let intentional = self
                        .pump(&mut *sink, &mut *source, &mut outbound_rx, &mut shutdown_rx)
                        .await;

                    self.connected.store(false, Ordering::SeqCst);
                    self.emit(DuplexEvent::Closed);
                    if intentional {
                        self.set_state(DuplexState::Closed);
                        return;
                    }
                    warn!("Duplex channel lost: {}", self.config.url);
                }
                Err(e) => {
                    // A dial that fails outright takes the same reconnect
                    // path as a dropped connection.
                    warn!("Duplex dial failed: {e}");
                    self.emit(DuplexEvent::Error(e.to_string()));
                }
            }

            if self.intentional_close.load(Ordering::SeqCst) {
                self.set_state(DuplexState::Closed);
                return;
            }
            if retry_count >= self.config.reconnect.max_retries {
                warn!(
                    "Duplex reconnect ceiling ({}) reached, giving up",
                    self.config.reconnect.max_retries
                );
                self.set_state(DuplexState::Exhausted);
                return;
            }

            let delay = self.config.reconnect.delay(retry_count);
            retry_count += 1;
            self.set_state(DuplexState::Reconnecting);
            info!(
                "Duplex reconnect attempt {} of {} in {delay:?}",
                retry_count, self.config.reconnect.max_retries
            );
            tokio::select! {
                _ = sleep(delay) => {}
                // Explicit connect() while the timer is pending: dial now
                // with a fresh retry budget.
                _ = self.redial.notified() => {
                    debug!("Explicit connect during backoff, dialing now");
                    retry_count = 0;
                }
                _ = shutdown_rx.recv() => {
                    self.set_state(DuplexState::Closed);
                    return;
                }
            }
        }
    }

    /// Shuttle frames in both directions until the connection drops or a
    /// shutdown arrives. Returns whether the stop was intentional.
    async fn pump(
        &self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
        outbound_rx: &mut mpsc::Receiver<Frame>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> bool {
        loop {
            tokio::select! {
                inbound = source.next() => match inbound {
                    Some(Ok(Frame::Text(text))) => self.emit(DuplexEvent::Text(text)),
                    Some(Ok(Frame::Binary(bytes))) => self.emit(DuplexEvent::Binary(bytes)),
                    Some(Err(e)) => {
                        self.emit(DuplexEvent::Error(e.to_string()));
                        return false;
                    }
                    None => return false,
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            self.emit(DuplexEvent::Error(e.to_string()));
                            return false;
                        }
                    }
                    // Sender gone: the manager was dropped or disconnected.
                    None => {
                        let _ = sink.close().await;
                        return true;
                    }
                },
                _ = shutdown_rx.recv() => {
                    let _ = sink.close().await;
                    return true;
                }
            }
        }
    }
}
