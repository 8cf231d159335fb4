//! Reconnection behavior under a scripted mock dialer and a paused clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use pulselink_core::error::{LinkError, LinkResult};
use pulselink_duplex::{
    Dialer, DuplexConfig, DuplexEvent, DuplexManager, DuplexState, Frame, FrameSink, FrameSource,
    ReconnectPolicy,
};

#[derive(Clone, Copy)]
enum Outcome {
    Fail,
    Succeed,
}

/// Handles to the far end of a mock connection.
struct ConnHandles {
    incoming_tx: mpsc::Sender<Frame>,
    outgoing_rx: mpsc::UnboundedReceiver<Frame>,
}

/// Dialer that follows a script, then repeats the final default outcome.
struct MockDialer {
    dials: AtomicUsize,
    script: Mutex<VecDeque<Outcome>>,
    default: Outcome,
    latest: Mutex<Option<ConnHandles>>,
}

impl MockDialer {
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            dials: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            default: Outcome::Fail,
            latest: Mutex::new(None),
        })
    }

    fn scripted(script: Vec<Outcome>, default: Outcome) -> Arc<Self> {
        Arc::new(Self {
            dials: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            default,
            latest: Mutex::new(None),
        })
    }

    fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    fn take_conn(&self) -> Option<ConnHandles> {
        self.latest.lock().take()
    }
}

struct TestSink {
    tx: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl FrameSink for TestSink {
    async fn send(&mut self, frame: Frame) -> LinkResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| LinkError::Network("peer gone".into()))
    }

    async fn close(&mut self) -> LinkResult<()> {
        Ok(())
    }
}

struct TestSource {
    rx: mpsc::Receiver<Frame>,
}

#[async_trait]
impl FrameSource for TestSource {
    async fn next(&mut self) -> Option<LinkResult<Frame>> {
        self.rx.recv().await.map(Ok)
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(
        &self,
        _url: &str,
        _protocols: &[String],
    ) -> LinkResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(self.default);
        match outcome {
            Outcome::Fail => Err(LinkError::Network("no route to backend".into())),
            Outcome::Succeed => {
                let (incoming_tx, incoming_rx) = mpsc::channel(16);
                let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
                *self.latest.lock() = Some(ConnHandles {
                    incoming_tx,
                    outgoing_rx,
                });
                Ok((
                    Box::new(TestSink { tx: outgoing_tx }),
                    Box::new(TestSource { rx: incoming_rx }),
                ))
            }
        }
    }
}

/// Dialer whose connections accept nothing: the sink never completes a send
/// and the source never yields a frame.
struct StallDialer;

struct StallSink;

#[async_trait]
impl FrameSink for StallSink {
    async fn send(&mut self, _frame: Frame) -> LinkResult<()> {
        std::future::pending().await
    }

    async fn close(&mut self) -> LinkResult<()> {
        Ok(())
    }
}

struct StallSource;

#[async_trait]
impl FrameSource for StallSource {
    async fn next(&mut self) -> Option<LinkResult<Frame>> {
        std::future::pending().await
    }
}

#[async_trait]
impl Dialer for StallDialer {
    async fn dial(
        &self,
        _url: &str,
        _protocols: &[String],
    ) -> LinkResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        Ok((Box::new(StallSink), Box::new(StallSource)))
    }
}

fn config_with(reconnect: ReconnectPolicy) -> DuplexConfig {
    DuplexConfig::new("wss://ops.example.mil/ws").with_reconnect(reconnect)
}

/// Let the connection task make progress without advancing the clock.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn reconnect_ceiling_stops_the_manager_permanently() {
    let dialer = MockDialer::failing();
    let reconnect = ReconnectPolicy::default()
        .with_max_retries(2)
        .with_jitter(Duration::ZERO);
    let (manager, _events) = DuplexManager::with_dialer(config_with(reconnect), dialer.clone());

    manager.connect();
    while manager.state() != DuplexState::Exhausted {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Initial dial plus exactly two reconnects.
    assert_eq!(dialer.dial_count(), 3);

    // Permanently stopped: no timer ever fires again.
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(dialer.dial_count(), 3);
    assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_a_pending_reconnect_timer() {
    let dialer = MockDialer::failing();
    let reconnect = ReconnectPolicy::default()
        .with_base_delay(Duration::from_secs(30))
        .with_jitter(Duration::ZERO);
    let (manager, _events) = DuplexManager::with_dialer(config_with(reconnect), dialer.clone());

    manager.connect();
    // yield_now (not sleep) so the paused clock cannot auto-advance past the
    // reconnect timer before we cancel it.
    settle().await;
    assert_eq!(manager.state(), DuplexState::Reconnecting);
    assert_eq!(dialer.dial_count(), 1);

    manager.disconnect();
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;

    assert_eq!(dialer.dial_count(), 1);
    assert_eq!(manager.state(), DuplexState::Closed);
}

#[tokio::test(start_paused = true)]
async fn explicit_connect_during_backoff_dials_with_a_fresh_budget() {
    let dialer = MockDialer::failing();
    let reconnect = ReconnectPolicy::default()
        .with_base_delay(Duration::from_secs(30))
        .with_max_retries(1)
        .with_jitter(Duration::ZERO);
    let (manager, _events) = DuplexManager::with_dialer(config_with(reconnect), dialer.clone());

    manager.connect();
    settle().await;
    assert_eq!(manager.state(), DuplexState::Reconnecting);
    assert_eq!(dialer.dial_count(), 1);

    // "Reconnect now" from the operator: no waiting out the 30s timer.
    manager.connect();
    settle().await;
    assert_eq!(dialer.dial_count(), 2);

    // The budget was reset, so the second failure schedules another attempt
    // rather than exhausting the single allowed retry.
    assert_eq!(manager.state(), DuplexState::Reconnecting);

    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn dial_failures_then_success_reset_the_retry_budget() {
    let dialer = MockDialer::scripted(vec![Outcome::Fail, Outcome::Fail], Outcome::Succeed);
    let reconnect = ReconnectPolicy::default().with_jitter(Duration::ZERO);
    let (manager, mut events) = DuplexManager::with_dialer(config_with(reconnect), dialer.clone());

    manager.connect();

    assert!(matches!(events.recv().await, Some(DuplexEvent::Error(_))));
    assert!(matches!(events.recv().await, Some(DuplexEvent::Error(_))));
    assert_eq!(events.recv().await, Some(DuplexEvent::Open));
    assert_eq!(dialer.dial_count(), 3);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn frames_flow_both_ways_while_open() {
    let dialer = MockDialer::scripted(vec![], Outcome::Succeed);
    let (manager, mut events) =
        DuplexManager::with_dialer(config_with(ReconnectPolicy::default()), dialer.clone());

    manager.connect();
    assert_eq!(events.recv().await, Some(DuplexEvent::Open));
    let mut conn = loop {
        match dialer.take_conn() {
            Some(conn) => break conn,
            None => tokio::task::yield_now().await,
        }
    };

    conn.incoming_tx
        .send(Frame::Text("vitals: stable".into()))
        .await
        .unwrap();
    assert_eq!(
        events.recv().await,
        Some(DuplexEvent::Text("vitals: stable".into()))
    );

    manager.send_text("roger");
    assert_eq!(
        conn.outgoing_rx.recv().await,
        Some(Frame::Text("roger".into()))
    );

    manager.disconnect();
    assert_eq!(events.recv().await, Some(DuplexEvent::Closed));
    settle().await;
    assert_eq!(manager.state(), DuplexState::Closed);
    assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_triggers_a_reconnect() {
    let dialer = MockDialer::scripted(vec![], Outcome::Succeed);
    let reconnect = ReconnectPolicy::default().with_jitter(Duration::ZERO);
    let (manager, mut events) = DuplexManager::with_dialer(config_with(reconnect), dialer.clone());

    manager.connect();
    assert_eq!(events.recv().await, Some(DuplexEvent::Open));
    let conn = loop {
        match dialer.take_conn() {
            Some(conn) => break conn,
            None => tokio::task::yield_now().await,
        }
    };

    // Peer vanishes: closing the incoming channel ends the source stream.
    drop(conn);
    assert_eq!(events.recv().await, Some(DuplexEvent::Closed));
    assert_eq!(events.recv().await, Some(DuplexEvent::Open));
    assert_eq!(dialer.dial_count(), 2);

    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn outbound_overflow_drops_instead_of_blocking() {
    let (manager, mut events) =
        DuplexManager::with_dialer(config_with(ReconnectPolicy::default()), Arc::new(StallDialer));

    manager.connect();
    assert_eq!(events.recv().await, Some(DuplexEvent::Open));

    // The peer accepts nothing, so the outbound buffer fills; sends past
    // capacity must return immediately instead of wedging the caller.
    for n in 0..200 {
        manager.send_text(format!("frame {n}"));
    }
    assert!(manager.is_connected());

    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn send_is_dropped_unless_open() {
    let dialer = MockDialer::failing();
    let (manager, _events) =
        DuplexManager::with_dialer(config_with(ReconnectPolicy::default()), dialer.clone());

    // Never connected: sends are silently discarded, not queued.
    manager.send_text("anyone there?");
    assert!(!manager.is_connected());

    manager.connect();
    settle().await;
    manager.send_text("still nothing");
    assert_eq!(dialer.take_conn().map(|_| ()), None);

    manager.disconnect();
}
