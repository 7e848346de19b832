use super::lines::SharedLineSource;
use super::multiplexer::{Console, Mode, SessionChannels, SessionEnd};
use super::presenter::Presenter;
use super::pumps::{inbound_pump, outbound_pump};
use crate::common::{LineSource, MessageSink, MessageSource};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capacity of the pump channels
///
/// A pump waits for the console to take each item before producing the
/// next, which keeps the hand-off as close to unbuffered as tokio allows.
pub const CHANNEL_CAPACITY: usize = 1;

/// Runs one session over an established connection
///
/// Spawns the inbound and outbound pumps, drives the [`Console`] until the
/// session ends, then stops both pumps. The outbound pump has released
/// `lines` by the time this returns, so a following session can use it.
pub async fn run_session<R, W, L, P>(
    source: R,
    sink: W,
    lines: SharedLineSource<L>,
    presenter: P,
    mode: Mode,
    shutdown: CancellationToken,
) -> SessionEnd
where
    R: MessageSource + 'static,
    W: MessageSink,
    L: LineSource + 'static,
    P: Presenter,
{
    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (closed_tx, closed_rx) = oneshot::channel();

    let reader = tokio::spawn(inbound_pump(source, inbound_tx, closed_tx));
    let writer = tokio::spawn(outbound_pump(lines, outbound_tx));

    let channels = SessionChannels {
        inbound: inbound_rx,
        outbound: outbound_rx,
        closed: closed_rx,
        shutdown,
    };
    let end = Console::new(sink, presenter, mode).run(channels).await;

    reader.abort();
    writer.abort();
    let _ = reader.await;
    let _ = writer.await;
    debug!(?end, "Session finished");
    end
}
