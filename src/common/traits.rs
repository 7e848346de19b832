use crate::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Outcome of a single receive on a transport endpoint
#[derive(Debug)]
pub enum Received {
    /// A complete inbound message
    Message(Bytes),
    /// The peer closed the connection
    Closed,
    /// The endpoint broke; the session treats this like a close
    Failed(GatewayError),
}

/// Read half of an established, message-framed connection
///
/// Exactly one task reads from a source for the lifetime of a session.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next inbound message
    async fn receive(&mut self) -> Received;
}

/// Write half of an established, message-framed connection
#[async_trait]
pub trait MessageSink: Send {
    /// Sends one message to the peer
    async fn send(&mut self, message: Bytes) -> Result<()>;

    /// Tells the peer the session is over
    async fn close(&mut self) -> Result<()>;
}

/// Supplier of completed operator lines
///
/// `read_line` returns `Ok(None)` at end of input.
#[async_trait]
pub trait LineSource: Send {
    /// Waits for the next completed line
    async fn read_line(&mut self) -> Result<Option<String>>;

    /// Drops lines that were completed but not yet read
    ///
    /// Returns how many were dropped.
    fn discard_pending(&mut self) -> usize;

    /// Records a line in the input history
    fn add_history(&mut self, line: &str);
}
