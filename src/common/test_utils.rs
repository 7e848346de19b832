//! In-memory collaborators for driving sessions without sockets or a terminal

use crate::common::traits::{LineSource, MessageSink, MessageSource, Received};
use crate::console::{Presenter, Style};
use crate::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Creates a connected in-memory transport
///
/// The source and sink go to the session under test; the [`RemotePeer`]
/// plays the other end of the connection.
pub fn memory_transport() -> (MemorySource, MemorySink, RemotePeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let fail_sends = Arc::new(AtomicBool::new(false));
    let stall_sends = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicBool::new(false));

    let source = MemorySource { inbound: rx };
    let sink = MemorySink {
        sent: sent.clone(),
        fail_sends: fail_sends.clone(),
        stall_sends: stall_sends.clone(),
        attempts: attempts.clone(),
        closed: closed.clone(),
    };
    let peer = RemotePeer {
        inbound: Some(tx),
        sent,
        fail_sends,
        stall_sends,
        attempts,
        closed,
    };
    (source, sink, peer)
}

pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Received>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn receive(&mut self) -> Received {
        self.inbound.recv().await.unwrap_or(Received::Closed)
    }
}

pub struct MemorySink {
    sent: Arc<Mutex<Vec<Bytes>>>,
    fail_sends: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, message: Bytes) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer stopped reading",
            )));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The far end of a [`memory_transport`]
pub struct RemotePeer {
    inbound: Option<mpsc::UnboundedSender<Received>>,
    sent: Arc<Mutex<Vec<Bytes>>>,
    fail_sends: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl RemotePeer {
    /// Queues a message for the session to receive
    pub fn deliver(&self, message: impl Into<Bytes>) {
        self.push(Received::Message(message.into()));
    }

    /// Closes the connection from the peer's side
    pub fn hang_up(&mut self) {
        self.push(Received::Closed);
        self.inbound = None;
    }

    /// Breaks the connection with an error
    pub fn break_with(&mut self, error: GatewayError) {
        self.push(Received::Failed(error));
        self.inbound = None;
    }

    /// Makes every later send fail
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Makes every later send hang, like a peer that stopped reading
    pub fn stall_sends(&self) {
        self.stall_sends.store(true, Ordering::SeqCst);
    }

    /// Everything the session has sent so far
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the session closed its sink
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` messages were sent
    pub async fn wait_for_sent(&self, count: usize, limit: Duration) -> bool {
        wait_until(limit, || self.sent().len() >= count).await
    }

    /// Waits until the session has started at least `count` sends
    pub async fn wait_for_attempts(&self, count: usize, limit: Duration) -> bool {
        wait_until(limit, || self.attempts.load(Ordering::SeqCst) >= count).await
    }

    fn push(&self, received: Received) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(received);
        }
    }
}

/// Creates a line source fed from the test
pub fn channel_lines() -> (ChannelLines, LineFeeder) {
    let (tx, rx) = mpsc::unbounded_channel();
    let history = Arc::new(Mutex::new(Vec::new()));
    (
        ChannelLines {
            lines: rx,
            history: history.clone(),
        },
        LineFeeder {
            lines: Some(tx),
            history,
        },
    )
}

pub struct ChannelLines {
    lines: mpsc::UnboundedReceiver<String>,
    history: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LineSource for ChannelLines {
    async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.recv().await)
    }

    fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.lines.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn add_history(&mut self, line: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Test-side handle of a [`ChannelLines`]
pub struct LineFeeder {
    lines: Option<mpsc::UnboundedSender<String>>,
    history: Arc<Mutex<Vec<String>>>,
}

impl LineFeeder {
    /// Submits a line as if the operator had pressed enter
    pub fn type_line(&self, line: &str) {
        if let Some(lines) = &self.lines {
            let _ = lines.send(line.to_string());
        }
    }

    /// Signals end of input
    pub fn end_input(&mut self) {
        self.lines = None;
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One call made on a [`RecordingPresenter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Clear,
    Text(String, Style),
}

/// Presenter that records what would have been drawn
///
/// Clones share the same record, so a copy can be handed to a server while
/// the test keeps another.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    rendered: Arc<Mutex<Vec<Rendered>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> Vec<Rendered> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts written in the given style, in order
    pub fn texts(&self, style: Style) -> Vec<String> {
        self.rendered()
            .into_iter()
            .filter_map(|r| match r {
                Rendered::Text(text, s) if s == style => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Number of writes containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.rendered()
            .iter()
            .filter(|r| matches!(r, Rendered::Text(text, _) if text.contains(needle)))
            .count()
    }

    /// Waits until `needle` has been written at least `times` times
    pub async fn wait_for(&self, needle: &str, times: usize, limit: Duration) -> bool {
        wait_until(limit, || self.count(needle) >= times).await
    }
}

impl Presenter for RecordingPresenter {
    fn clear_line(&mut self) -> io::Result<()> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rendered::Clear);
        Ok(())
    }

    fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rendered::Text(text.to_string(), style));
        Ok(())
    }
}

async fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}
