use super::config::ConnectConfig;
use super::transport::{WsSink, WsSource, split};
use crate::common::LineSource;
use crate::console::{Mode, Presenter, SessionEnd, run_session};
use crate::{GatewayError, Result};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::MaybeTlsStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type DialedStream = MaybeTlsStream<TcpStream>;

/// Dials the configured server and completes the upgrade
pub async fn connect(config: &ConnectConfig) -> Result<(WsSink<DialedStream>, WsSource<DialedStream>)> {
    let request = config.client_request()?;
    let handshake = tokio_tungstenite::connect_async_with_config(
        request,
        Some(config.websocket_config()),
        false,
    );
    let (stream, response) = timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| GatewayError::Timeout(format!("connecting to {} timed out", config.url)))??;
    debug!(status = %response.status(), "WebSocket handshake completed");
    Ok(split(stream))
}

/// Dials out and runs exactly one session
///
/// Connection failures are returned as errors before any session starts.
///
/// # Examples
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use wsgat::websocket::{ConnectConfig, client};
/// use wsgat::{AnsiConsole, StdinLines};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ConnectConfig::new("ws://127.0.0.1:8080/")?;
///     let end = client::run(&config, StdinLines::new(), AnsiConsole::stdout(), CancellationToken::new()).await?;
///     println!("session ended: {end:?}");
///     Ok(())
/// }
/// ```
pub async fn run<L, P>(
    config: &ConnectConfig,
    lines: L,
    presenter: P,
    shutdown: CancellationToken,
) -> Result<SessionEnd>
where
    L: LineSource + 'static,
    P: Presenter,
{
    let (sink, source) = connect(config).await?;
    info!(url = %config.url, "Connected");

    let end = run_session(
        source,
        sink,
        Arc::new(Mutex::new(lines)),
        presenter,
        Mode::Dialing,
        shutdown,
    )
    .await;
    info!(url = %config.url, ?end, "Disconnected");
    Ok(end)
}
