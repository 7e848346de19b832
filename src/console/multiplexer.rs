use super::presenter::{INBOUND_MARKER, Presenter, Style};
use crate::GatewayError;
use crate::common::MessageSink;
use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Which side of the connection this process is on
///
/// Only the greeting differs; the loop is the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A peer connected to our listener
    Listening,
    /// We dialed out to a server
    Dialing,
}

impl Mode {
    pub fn greeting(self) -> &'static str {
        match self {
            Mode::Listening => "client connected\n",
            Mode::Dialing => "connected (press CTRL+C to quit)\n",
        }
    }
}

/// Farewell shown when a session ends, whatever the reason
pub const FAREWELL: &str = "disconnected\n";

/// How long the closing handshake may take before the sink is abandoned
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The inbound side closed or broke
    PeerClosed,
    /// The operator or the server asked to stop
    Interrupted,
    /// Sending an operator line failed
    SendFailed(GatewayError),
}

impl SessionEnd {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEnd::SendFailed(_))
    }
}

/// Receiving ends of the channels the pumps feed
pub struct SessionChannels {
    /// Messages from the inbound pump
    pub inbound: mpsc::Receiver<Bytes>,
    /// Lines from the outbound pump
    pub outbound: mpsc::Receiver<Bytes>,
    /// Fired once when the inbound pump stops
    pub closed: oneshot::Receiver<()>,
    /// Cancelled on Ctrl+C or server shutdown
    pub shutdown: CancellationToken,
}

/// The session loop
///
/// Owns all terminal output and the only write path to the peer. Inbound
/// messages, operator lines, the termination signal and shutdown are
/// awaited together with no priority among them.
pub struct Console<W, P> {
    sink: W,
    presenter: P,
    mode: Mode,
}

impl<W: MessageSink, P: Presenter> Console<W, P> {
    pub fn new(sink: W, presenter: P, mode: Mode) -> Self {
        Self {
            sink,
            presenter,
            mode,
        }
    }

    /// Runs the session until the peer closes, a send fails, or shutdown
    ///
    /// Always ends with the farewell notice and a best-effort close of the
    /// sink. No send is attempted after the loop has ended.
    pub async fn run(mut self, channels: SessionChannels) -> SessionEnd {
        let SessionChannels {
            mut inbound,
            mut outbound,
            mut closed,
            shutdown,
        } = channels;

        let mode = self.mode;
        self.render(|p| {
            if mode == Mode::Listening {
                p.clear_line()?;
            }
            p.write(mode.greeting(), Style::Status)?;
            p.prompt()
        });

        let mut inbound_open = true;
        let mut outbound_open = true;
        let end = loop {
            tokio::select! {
                _ = &mut closed => {
                    self.drain_inbound(&mut inbound);
                    break SessionEnd::PeerClosed;
                }
                message = inbound.recv(), if inbound_open => match message {
                    Some(message) => self.show_inbound(&message),
                    None => inbound_open = false,
                },
                line = outbound.recv(), if outbound_open => match line {
                    Some(line) => {
                        // A peer that already hung up gets nothing more.
                        if peer_gone(&mut closed) {
                            self.drain_inbound(&mut inbound);
                            break SessionEnd::PeerClosed;
                        }
                        tokio::select! {
                            sent = self.sink.send(line) => {
                                if let Err(e) = sent {
                                    break SessionEnd::SendFailed(e);
                                }
                            }
                            _ = shutdown.cancelled() => break SessionEnd::Interrupted,
                        }
                    }
                    None => {
                        debug!("Operator input ended, inbound traffic still shown");
                        outbound_open = false;
                    }
                },
                _ = shutdown.cancelled() => break SessionEnd::Interrupted,
            }
        };

        if let SessionEnd::SendFailed(e) = &end {
            error!(error = %e, "Failed to send message, ending session");
            let notice = format!("error: {e}\n");
            self.render(|p| {
                p.clear_line()?;
                p.write(&notice, Style::Error)
            });
        }
        self.render(|p| {
            p.clear_line()?;
            p.write(FAREWELL, Style::Status)
        });

        match timeout(CLOSE_TIMEOUT, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Failed to close connection cleanly"),
            Err(_) => debug!("Peer did not take the close frame in time"),
        }
        end
    }

    /// Shows whatever the inbound pump handed over before it stopped
    fn drain_inbound(&mut self, inbound: &mut mpsc::Receiver<Bytes>) {
        while let Ok(message) = inbound.try_recv() {
            self.show_inbound(&message);
        }
    }

    fn show_inbound(&mut self, message: &[u8]) {
        let text = format!("{INBOUND_MARKER}{}\n", String::from_utf8_lossy(message));
        self.render(|p| {
            p.clear_line()?;
            p.write(&text, Style::Inbound)?;
            p.prompt()
        });
    }

    /// Terminal failures are cosmetic; they never end the session.
    fn render(&mut self, draw: impl FnOnce(&mut P) -> io::Result<()>) {
        if let Err(e) = draw(&mut self.presenter) {
            warn!(error = %e, "Failed to draw console output");
        }
    }
}

/// Whether the inbound pump has already stopped
fn peer_gone(closed: &mut oneshot::Receiver<()>) -> bool {
    !matches!(closed.try_recv(), Err(oneshot::error::TryRecvError::Empty))
}
