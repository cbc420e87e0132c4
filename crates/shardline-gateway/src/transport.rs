//! Transport seam
//!
//! The shard talks to the gateway through these traits so tests can script a
//! connection in memory. [`WsTransport`] is the tokio-tungstenite implementation.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;

/// Close code that ends the session for good
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when the client intends to resume
pub const CLOSE_RESUMABLE: u16 = 4000;

/// Something read from the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

/// Opens gateway connections
#[async_trait]
pub trait GatewayTransport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn GatewayConnection>, TransportError>;
}

/// One open gateway connection
///
/// `recv` must be cancel-safe: the shard polls it inside `select!`.
#[async_trait]
pub trait GatewayConnection: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound item; `None` once the stream ended without a close frame.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl GatewayTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn GatewayConnection>, TransportError> {
        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        tracing::debug!(url = %url, "WebSocket connected");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

fn ws_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error;
    match err {
        Error::ConnectionClosed | Error::AlreadyClosed => TransportError::Closed,
        other => TransportError::WebSocket(other.to_string()),
    }
}

#[async_trait]
impl GatewayConnection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await.map_err(ws_error)
    }

    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(ws_error(e))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Inbound::Text(text))),
                Message::Binary(bytes) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map(Inbound::Text)
                            .map_err(|_| TransportError::UnsupportedFrame),
                    );
                }
                Message::Close(frame) => {
                    let (code, reason) = frame.map_or((None, String::new()), |frame| {
                        (Some(u16::from(frame.code)), frame.reason.into_owned())
                    });
                    return Some(Ok(Inbound::Close { code, reason }));
                }
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: Cow::Borrowed(""),
        };
        self.stream.close(Some(frame)).await.map_err(ws_error)
    }
}

/// Append the protocol version and encoding to a gateway URL
pub fn gateway_url(base: &str, api_version: u8) -> String {
    let base = base.split('?').next().unwrap_or(base).trim_end_matches('/');
    format!("{base}/?v={api_version}&encoding=json")
}
