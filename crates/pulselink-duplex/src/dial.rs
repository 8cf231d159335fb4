//! Connection establishment behind a trait seam.
//!
//! The manager only ever sees [`FrameSink`]/[`FrameSource`] halves produced
//! by a [`Dialer`], so tests can substitute channel-backed connections and
//! count dial attempts; production uses [`TungsteniteDialer`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::trace;

use pulselink_core::error::{LinkError, LinkResult};

/// One application-level frame on the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

/// Write half of an established duplex connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame.
    async fn send(&mut self, frame: Frame) -> LinkResult<()>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> LinkResult<()>;
}

/// Read half of an established duplex connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next inbound frame; `None` once the connection is closed.
    async fn next(&mut self) -> Option<LinkResult<Frame>>;
}

/// Opens duplex connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Establish a connection to `url`, offering the given subprotocols.
    #[allow(clippy::type_complexity)]
    async fn dial(
        &self,
        url: &str,
        protocols: &[String],
    ) -> LinkResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)>;
}

/// Production dialer backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteDialer;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> LinkResult<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.inner
            .send(message)
            .await
            .map_err(|e| LinkError::Network(e.to_string()))
    }

    async fn close(&mut self) -> LinkResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| LinkError::Network(e.to_string()))
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next(&mut self) -> Option<LinkResult<Frame>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes))),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by the protocol layer; pongs and raw
                // frames carry nothing for the application.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    trace!("Ignoring control frame");
                }
                Err(e) => return Some(Err(LinkError::Network(e.to_string()))),
            }
        }
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(
        &self,
        url: &str,
        protocols: &[String],
    ) -> LinkResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        let mut request = url
            .into_client_request()
            .map_err(|e| LinkError::Network(format!("invalid duplex URL: {e}")))?;
        if !protocols.is_empty() {
            let value = protocols
                .join(", ")
                .parse()
                .map_err(|e| LinkError::Network(format!("invalid subprotocol list: {e}")))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| LinkError::Network(e.to_string()))?;
        let (sink, source) = stream.split();
        Ok((
            Box::new(WsSink { inner: sink }),
            Box::new(WsSource { inner: source }),
        ))
    }
}
