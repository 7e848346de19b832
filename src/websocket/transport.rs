use crate::common::{MessageSink, MessageSource, Received};
use crate::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::trace;

/// Read half of a WebSocket connection
pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket connection
pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
}

/// Splits an upgraded connection into its write and read halves
pub fn split<S>(stream: WebSocketStream<S>) -> (WsSink<S>, WsSource<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, source) = stream.split();
    (WsSink { inner: sink }, WsSource { inner: source })
}

#[async_trait]
impl<S> MessageSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Received {
        loop {
            match self.inner.next().await {
                Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                    return Received::Message(message.into_data());
                }
                Some(Ok(Message::Close(frame))) => {
                    trace!(?frame, "Close frame received");
                    return Received::Closed;
                }
                // Control frames are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Received::Closed;
                }
                Some(Err(e)) => return Received::Failed(GatewayError::WebSocket(e)),
            }
        }
    }
}

#[async_trait]
impl<S> MessageSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Text frame for UTF-8 payloads, binary frame otherwise
    async fn send(&mut self, message: Bytes) -> Result<()> {
        let message = match std::str::from_utf8(&message) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(message),
        };
        self.inner.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
