use super::config::ListenConfig;
use super::transport::split;
use crate::common::LineSource;
use crate::console::{Mode, Presenter, SessionEnd, SharedLineSource, Style, run_session};
use crate::security::ConnectionSlot;
use crate::{GatewayError, Result};
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::{signal, time::timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Listening-mode server
///
/// Accepts WebSocket peers and runs at most one console session at a time.
/// Peers that complete their upgrade while a session is running get a close
/// frame straight away, and the server keeps listening.
///
/// # Examples
///
/// ```no_run
/// use wsgat::{AnsiConsole, ListenConfig, ListenServer, StdinLines};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = ListenServer::new(
///         ListenConfig::for_port(8080),
///         StdinLines::new(),
///         AnsiConsole::stdout(),
///     );
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct ListenServer<L, P> {
    config: ListenConfig,
    slot: Arc<ConnectionSlot>,
    lines: SharedLineSource<L>,
    presenter: P,
    shutdown: CancellationToken,
}

impl<L, P> ListenServer<L, P>
where
    L: LineSource + 'static,
    P: Presenter + Clone + 'static,
{
    pub fn new(config: ListenConfig, lines: L, presenter: P) -> Self {
        Self {
            config,
            slot: Arc::new(ConnectionSlot::new()),
            lines: Arc::new(Mutex::new(lines)),
            presenter,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an existing slot instead of a fresh one
    pub fn with_slot(mut self, slot: Arc<ConnectionSlot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn slot(&self) -> &Arc<ConnectionSlot> {
        &self.slot
    }

    /// Token that stops the server and any running session when cancelled
    pub fn shutdown_signal(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            GatewayError::Config(format!(
                "Failed to bind {}: {}",
                self.config.bind_addr, e
            ))
        })
    }

    /// Binds, announces the port, and serves until Ctrl+C or shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        let port = listener.local_addr()?.port();
        let banner = format!("listening on port {port} (press CTRL+C to quit)\n");
        let mut presenter = self.presenter.clone();
        presenter.write(&banner, Style::Status)?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(address = %listener.local_addr()?, "WebSocket console listening");
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let span = tracing::info_span!("connection", %addr);
                        sessions.spawn(self.session(stream, addr).instrument(span));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(joined) = sessions.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Session task failed");
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        // Let a running session print its farewell before returning.
        self.shutdown.cancel();
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Session task failed");
            }
        }
        info!("WebSocket console stopped");
        Ok(())
    }

    /// Upgrades one accepted stream and, if the slot is free, runs its session
    ///
    /// The slot is only claimed once the upgrade has completed, so a socket
    /// that never finishes its handshake cannot keep real peers out.
    fn session(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> impl Future<Output = ()> + Send + use<L, P> {
        let config = self.config.clone();
        let slot = self.slot.clone();
        let lines = self.lines.clone();
        let mut presenter = self.presenter.clone();
        let shutdown = self.shutdown.clone();

        async move {
            let upgraded = tokio::select! {
                upgraded = upgrade(stream, &config) => upgraded,
                _ = shutdown.cancelled() => return,
            };
            let mut stream = match upgraded {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(%addr, error = %e, "WebSocket upgrade failed");
                    return;
                }
            };
            let Some(_guard) = slot.try_claim() else {
                info!(%addr, "Connection declined: a session is already running");
                decline(&mut stream, config.handshake_timeout).await;
                return;
            };
            info!(%addr, "Client connected");

            let stale = lines.lock().await.discard_pending();
            if stale > 0 {
                debug!(stale, "Dropped lines typed while no peer was connected");
                let notice = format!("dropped {stale} line(s) typed before this client connected\n");
                if let Err(e) = presenter
                    .clear_line()
                    .and_then(|()| presenter.write(&notice, Style::Warning))
                {
                    warn!(error = %e, "Failed to draw console output");
                }
            }

            let (sink, source) = split(stream);
            match run_session(source, sink, lines, presenter, Mode::Listening, shutdown).await {
                SessionEnd::SendFailed(e) => warn!(%addr, error = %e, "Session ended by send failure"),
                end => info!(%addr, ?end, "Client disconnected"),
            }
        }
    }
}

/// Closes an upgraded stream that did not get the slot
async fn decline(stream: &mut WebSocketStream<TcpStream>, limit: Duration) {
    let close = CloseFrame {
        code: CloseCode::Again,
        reason: "a session is already running".into(),
    };
    match timeout(limit, stream.close(Some(close))).await {
        Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed)) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to close declined connection cleanly"),
        Err(_) => debug!("Declined peer did not take the close frame in time"),
    }
}

/// Completes the WebSocket upgrade for requests on the configured path
async fn upgrade(stream: TcpStream, config: &ListenConfig) -> Result<WebSocketStream<TcpStream>> {
    let path = config.path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            debug!(path = request.uri().path(), "Rejecting upgrade for unknown path");
            let mut not_found = ErrorResponse::new(Some("not found".to_string()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Err(not_found)
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        check_path,
        Some(config.websocket_config()),
    );
    let stream = timeout(config.handshake_timeout, handshake)
        .await
        .map_err(|_| GatewayError::Timeout("WebSocket upgrade timed out".to_string()))??;
    Ok(stream)
}
