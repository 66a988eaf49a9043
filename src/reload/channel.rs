//! Per-connection notification channel.
//!
//! Each open client connection gets one channel, which:
//! - subscribes to the [`ChangeLog`] and forwards the newest head after a
//!   short debounce, coalescing bursts from a single build pass
//! - sends a `ping` every [`HEARTBEAT_INTERVAL`] while the connection is open
//! - tears everything down exactly once when the connection closes
//!
//! # Lifecycle
//!
//! ```text
//! Connected --subscribe--> Idle <--> Sending
//!     |                      |          |
//!     +----------------------+----------+--> Closed
//! ```
//!
//! The log observer only stores the new head in a `watch` slot, so `append`
//! never waits on a slow client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::log::{ChangeLog, SubscriptionId};
use super::message::ChangeEvent;

/// Interval between keep-alive pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);

/// Default wait before forwarding a log append.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Transport failure while sending.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// The transport seen from the channel: send text, query and close.
pub trait Connection: Send + Sync + 'static {
    /// Send one text frame.
    fn send_text(&self, text: String) -> Result<(), ConnectionError>;

    /// Whether the transport still accepts frames.
    fn is_open(&self) -> bool;

    /// Close the transport. Must be idempotent.
    fn close(&self);

    /// Peer description for log output.
    fn peer(&self) -> String {
        "client".to_string()
    }
}

/// Channel timing.
#[derive(Debug, Clone, Copy)]
pub struct ChannelOptions {
    pub debounce: Duration,
    pub heartbeat: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }
}

/// Observable state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Connected = 0,
    Idle = 1,
    Sending = 2,
    Closed = 3,
}

#[cfg(test)]
impl ChannelState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connected,
            1 => Self::Idle,
            2 => Self::Sending,
            _ => Self::Closed,
        }
    }
}

struct ChannelInner {
    conn: Arc<dyn Connection>,
    log: Arc<ChangeLog>,
    subscription: Mutex<Option<SubscriptionId>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    state: AtomicU8,
    closed_tx: watch::Sender<bool>,
}

/// Handle to one client's delivery loop. Cheap to clone.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<ChannelInner>,
}

impl NotificationChannel {
    /// Subscribe `conn` to `log` and start its delivery and heartbeat tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(conn: Arc<dyn Connection>, log: Arc<ChangeLog>, options: ChannelOptions) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        let inner = Arc::new(ChannelInner {
            conn,
            log,
            subscription: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            state: AtomicU8::new(ChannelState::Connected as u8),
            closed_tx,
        });

        // Late joiners only see appends made after this point
        let (head_tx, head_rx) = watch::channel::<Option<Arc<ChangeEvent>>>(None);
        let id = inner.log.subscribe(move |_old, new| {
            if let Some(head) = new.first() {
                head_tx.send_replace(Some(Arc::clone(head)));
            }
        });
        *inner.subscription.lock() = Some(id);
        inner.set_state(ChannelState::Idle);

        let delivery = tokio::spawn(deliver(
            Arc::clone(&inner),
            head_rx,
            closed_rx.clone(),
            options.debounce,
        ));
        let heartbeat = tokio::spawn(heartbeat(Arc::clone(&inner), closed_rx, options.heartbeat));
        inner.tasks.lock().extend([delivery, heartbeat]);

        crate::debug!("ws"; "client connected: {}", inner.conn.peer());
        Self { inner }
    }

    /// Unsubscribe, stop both tasks and close the transport. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    #[cfg(test)]
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.inner.state.load(Ordering::Acquire))
    }
}

impl ChannelInner {
    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    fn close(&self) {
        if self.closed_tx.send_replace(true) {
            return;
        }
        self.set_state(ChannelState::Closed);

        if let Some(id) = self.subscription.lock().take() {
            self.log.unsubscribe(id);
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.conn.close();

        crate::log!("ws"; "client disconnected: {}", self.conn.peer());
    }

    /// Serialize and send one event. A closed connection makes this a no-op.
    fn send_event(&self, event: &ChangeEvent) -> bool {
        if self.is_closed() || !self.conn.is_open() {
            return false;
        }

        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                crate::log!("ws"; "failed to encode {}: {}", event.name(), e);
                return false;
            }
        };

        self.set_state(ChannelState::Sending);
        let result = self.conn.send_text(text);
        if !self.is_closed() {
            self.set_state(ChannelState::Idle);
        }

        match result {
            Ok(()) => {
                crate::debug!("ws"; "sent {} to {}", event.name(), self.conn.peer());
                true
            }
            Err(ConnectionError::Closed) => {
                self.close();
                false
            }
            Err(e) => {
                crate::debug!("ws"; "send to {} failed: {}", self.conn.peer(), e);
                self.close();
                false
            }
        }
    }
}

/// Resolve once the channel is marked closed.
async fn closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Forward the newest log head after each append, debounced.
async fn deliver(
    inner: Arc<ChannelInner>,
    mut head_rx: watch::Receiver<Option<Arc<ChangeEvent>>>,
    mut closed_rx: watch::Receiver<bool>,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = closed(&mut closed_rx) => return,
            changed = head_rx.changed() => {
                if changed.is_err() {
                    // Observer dropped: unsubscribed
                    return;
                }
            }
        }

        tokio::select! {
            biased;
            _ = closed(&mut closed_rx) => return,
            _ = tokio::time::sleep(debounce) => {}
        }

        let head = head_rx.borrow_and_update().clone();
        if let Some(event) = head {
            inner.send_event(&event);
        }
    }
}

/// Send a ping every `period` until closed.
async fn heartbeat(inner: Arc<ChannelInner>, mut closed_rx: watch::Receiver<bool>, period: Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    let ping = ChangeEvent::ping();

    loop {
        tokio::select! {
            biased;
            _ = closed(&mut closed_rx) => return,
            _ = ticker.tick() => {
                if !inner.conn.is_open() {
                    inner.close();
                    return;
                }
                inner.send_event(&ping);
            }
        }
    }
}

// =============================================================================
// In-memory transport
// =============================================================================

/// Connection that records frames instead of writing them.
#[cfg(test)]
pub(crate) struct MemoryConnection {
    sent: Mutex<Vec<String>>,
    open: std::sync::atomic::AtomicBool,
    closes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryConnection {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            open: std::sync::atomic::AtomicBool::new(true),
            closes: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames parsed back into events.
    pub(crate) fn events(&self) -> Vec<ChangeEvent> {
        self.sent()
            .iter()
            .filter_map(|s| ChangeEvent::from_json(s))
            .collect()
    }

    /// Simulate the peer going away without a close callback.
    pub(crate) fn drop_link(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Connection for MemoryConnection {
    fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }

    fn peer(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn open(log: &Arc<ChangeLog>) -> (Arc<MemoryConnection>, NotificationChannel) {
        let conn = MemoryConnection::new();
        let channel = NotificationChannel::open(
            conn.clone(),
            Arc::clone(log),
            ChannelOptions::default(),
        );
        (conn, channel)
    }

    fn warning(msg: &str) -> ChangeEvent {
        ChangeEvent::compile_warning(msg)
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_is_sent_after_debounce() {
        let log = Arc::new(ChangeLog::new());
        let (conn, _channel) = open(&log);
        tokio::task::yield_now().await;

        log.append(warning("one"));
        tokio::task::yield_now().await;
        assert!(conn.sent().is_empty());

        sleep(Duration::from_millis(20)).await;
        assert_eq!(conn.events(), vec![warning("one")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_newest_head() {
        let log = Arc::new(ChangeLog::new());
        let (conn, _channel) = open(&log);
        tokio::task::yield_now().await;

        log.append(warning("one"));
        log.append(warning("two"));
        log.append(warning("three"));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(conn.events(), vec![warning("three")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_appends_arrive_in_order() {
        let log = Arc::new(ChangeLog::new());
        let (conn, _channel) = open(&log);
        tokio::task::yield_now().await;

        log.append(warning("one"));
        sleep(Duration::from_millis(50)).await;
        log.append(warning("two"));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(conn.events(), vec![warning("one"), warning("two")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_gets_no_replay() {
        let log = Arc::new(ChangeLog::new());
        log.append(warning("before-1"));
        log.append(warning("before-2"));

        let (conn, _channel) = open(&log);
        sleep(Duration::from_millis(50)).await;
        assert!(conn.sent().is_empty());

        log.append(warning("after"));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(conn.events(), vec![warning("after")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_debounce_skips_send() {
        let log = Arc::new(ChangeLog::new());
        let (conn, channel) = open(&log);
        tokio::task::yield_now().await;

        log.append(warning("pending"));
        tokio::task::yield_now().await;
        channel.close();

        sleep(Duration::from_millis(50)).await;
        assert!(conn.sent().is_empty());
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_every_five_seconds() {
        let log = Arc::new(ChangeLog::new());
        let (conn, _channel) = open(&log);

        sleep(Duration::from_millis(4_999)).await;
        assert!(conn.sent().is_empty());

        sleep(Duration::from_millis(5_002)).await;
        assert_eq!(conn.sent(), vec![r#"{"msg-name":"ping"}"#; 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_heartbeat_and_unsubscribes() {
        let log = Arc::new(ChangeLog::new());
        let (conn, channel) = open(&log);
        assert_eq!(log.observer_count(), 1);

        channel.close();
        assert_eq!(log.observer_count(), 0);

        sleep(Duration::from_secs(20)).await;
        log.append(warning("ignored"));
        sleep(Duration::from_millis(50)).await;
        assert!(conn.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_close_is_noop() {
        let log = Arc::new(ChangeLog::new());
        let (conn, channel) = open(&log);

        channel.close();
        channel.clone().close();

        assert!(channel.is_closed());
        assert_eq!(conn.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_link_detected_by_heartbeat() {
        let log = Arc::new(ChangeLog::new());
        let (conn, channel) = open(&log);

        conn.drop_link();
        sleep(Duration::from_millis(5_001)).await;

        assert!(channel.is_closed());
        assert_eq!(log.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_appends_do_not_block_log() {
        let log = Arc::new(ChangeLog::new());
        let channels: Vec<_> = (0..3).map(|_| open(&log)).collect();

        for i in 0..40 {
            log.append(warning(&format!("w{i}")));
        }
        assert_eq!(log.len(), 30);

        sleep(Duration::from_millis(50)).await;
        for (conn, _) in &channels {
            assert_eq!(conn.events(), vec![warning("w39")]);
        }
    }
}
