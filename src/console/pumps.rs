use super::lines::{SharedLineSource, normalize_line};
use crate::common::{LineSource, MessageSource, Received};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Moves inbound messages from the endpoint to the console
///
/// Stops at the first close or failure and then fires `closed` exactly
/// once. A broken endpoint ends the session; it is never retried.
pub async fn inbound_pump<R: MessageSource>(
    mut source: R,
    messages: mpsc::Sender<Bytes>,
    closed: oneshot::Sender<()>,
) {
    loop {
        match source.receive().await {
            Received::Message(message) => {
                trace!(size = message.len(), "Received message");
                if messages.send(message).await.is_err() {
                    // Console already gone
                    break;
                }
            }
            Received::Closed => {
                debug!("Peer closed the connection");
                break;
            }
            Received::Failed(e) => {
                debug!(error = %e, "Receive failed, ending session");
                break;
            }
        }
    }
    drop(messages);
    let _ = closed.send(());
}

/// Moves completed operator lines to the console
///
/// Every line goes into the input history before it is forwarded, whether
/// or not the later send succeeds. End of input or a read error stops the
/// pump quietly; only the inbound side ends a session.
pub async fn outbound_pump<L: LineSource + 'static>(
    lines: SharedLineSource<L>,
    outbound: mpsc::Sender<Bytes>,
) {
    let mut lines = lines.lock_owned().await;
    loop {
        let line = match lines.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("End of operator input");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read operator input");
                break;
            }
        };
        lines.add_history(&line);
        let line = Bytes::copy_from_slice(normalize_line(&line).as_bytes());
        if outbound.send(line).await.is_err() {
            break;
        }
    }
}
