//! Frame transport contract and the WebSocket implementation
//!
//! The session does not talk to tokio-tungstenite directly. It speaks to a
//! small trait surface (connect, send binary frame, receive events, close
//! with code and reason) so that tests can substitute a scripted transport
//! and the production path can stay a thin adapter.
//!
//! A connection splits into a [`FrameSink`] (owned behind the session's send
//! lock) and a [`FrameSource`] (consumed by the session's driver task). The
//! driver owns exactly one source at a time and replaces it only on a
//! successful reconnect, so events from a superseded transport cannot be
//! delivered.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use mprow_core::{Error, Result};
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Observable connection state, mirrored for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connect attempt is in flight.
    Connecting,
    /// The transport is established and usable.
    Open,
    /// A close handshake is in progress.
    Closing,
    /// No transport; the initial state.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One event delivered by a [`FrameSource`].
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A received binary frame.
    Frame(Vec<u8>),
    /// The peer closed the connection.
    Closed {
        /// Close code from the peer (1005 when absent).
        code: u16,
        /// Close reason from the peer.
        reason: String,
    },
    /// The transport failed; the connection is considered lost.
    Error(String),
}

/// Outbound half of an established connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one binary frame.
    async fn send(&mut self, frame: Vec<u8>) -> Result<()>;

    /// Close the connection with a code and reason.
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Inbound half of an established connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next transport event, or `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Establishes connections. The session holds one connector for the life of
/// the client and calls it again for every reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`, offering `protocols` as sub-protocols.
    async fn connect(
        &self,
        url: &str,
        protocols: &[String],
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)>;
}

/// Production connector over tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        protocols: &[String],
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::Transport(e.to_string()))?;
        if !protocols.is_empty() {
            let offered = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| Error::Transport(e.to_string()))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", offered);
        }
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let (sink, stream) = ws_stream.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsSource { stream })))
    }
}

struct WsSink {
    sink: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Binary(frame))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

struct WsSource {
    stream: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Binary(bytes)) => return Some(TransportEvent::Frame(bytes)),
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.into_owned()),
                        None => (1005, String::new()),
                    };
                    return Some(TransportEvent::Closed { code, reason });
                }
                // Text, ping, and pong frames are not part of the protocol
                Ok(_) => continue,
                Err(e) => return Some(TransportEvent::Error(e.to_string())),
            }
        }
    }
}
