//! Common test utilities for mprow-client integration tests
//!
//! A scripted connector stands in for the WebSocket transport: each test
//! declares the outcome of every connect attempt up front, then drives the
//! session by pushing transport events and reading the frames the session
//! sent.
#![allow(dead_code)]

use async_trait::async_trait;
use mprow_client::{
    ClientConfig, ClientEvent, Connector, EventKind, FrameSink, FrameSource, MprowClient,
    TransportEvent,
};
use mprow_core::{msgpack, Error, ErrorData, Id, Response, Result, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of one scripted connect attempt.
pub enum ConnectOutcome {
    Accept(ScriptedLink),
    Refuse(String),
}

/// Transport halves handed to the session when an attempt is accepted.
pub struct ScriptedLink {
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    sent_tx: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

/// Test-side handle to one scripted connection.
pub struct LinkHandle {
    /// Push transport events into the session.
    pub events: mpsc::UnboundedSender<TransportEvent>,
    /// Frames the session sent on this connection.
    pub sent: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Close code and reason the session passed to the sink, if any.
    pub closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl LinkHandle {
    /// Deliver one inbound frame to the session.
    pub fn push_frame(&self, frame: Vec<u8>) {
        self.events
            .send(TransportEvent::Frame(frame))
            .expect("session dropped the transport");
    }

    /// Tell the session the peer closed the connection.
    pub fn push_closed(&self, code: u16, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// Await the next frame the session sends, decoded.
    pub async fn expect_frame(&mut self) -> Value {
        let bytes = tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("sink dropped");
        msgpack::decode(&bytes).expect("outbound frame must decode")
    }

    /// Assert no frame is sent within `window`. A dropped sink counts as
    /// silence.
    pub async fn expect_silence(&mut self, window: Duration) {
        match tokio::time::timeout(window, self.sent.recv()).await {
            Err(_) | Ok(None) => {}
            Ok(Some(frame)) => panic!("unexpected outbound frame ({} bytes)", frame.len()),
        }
    }
}

/// Create one accepted connection and its test handle.
pub fn accept() -> (ConnectOutcome, LinkHandle) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(Mutex::new(None));
    let link = ScriptedLink {
        events_rx,
        sent_tx,
        closed: Arc::clone(&closed),
    };
    let handle = LinkHandle {
        events: events_tx,
        sent: sent_rx,
        closed,
    };
    (ConnectOutcome::Accept(link), handle)
}

/// Create a refused connect attempt.
pub fn refuse(message: &str) -> ConnectOutcome {
    ConnectOutcome::Refuse(message.to_string())
}

/// Connector that replays a fixed script of connect outcomes.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    /// Every URL the session tried to connect to, in order.
    pub urls: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<ConnectOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        url: &str,
        _protocols: &[String],
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        self.urls.lock().unwrap().push(url.to_string());
        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            Some(ConnectOutcome::Accept(link)) => Ok((
                Box::new(ScriptedSink {
                    sent: link.sent_tx,
                    closed: link.closed,
                }),
                Box::new(ScriptedSource {
                    events: link.events_rx,
                }),
            )),
            Some(ConnectOutcome::Refuse(message)) => Err(Error::Transport(message)),
            None => Err(Error::Transport("no scripted connection left".into())),
        }
    }
}

struct ScriptedSink {
    sent: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        self.sent
            .send(frame)
            .map_err(|_| Error::Transport("scripted sink closed".into()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        *self.closed.lock().unwrap() = Some((code, reason.to_string()));
        Ok(())
    }
}

struct ScriptedSource {
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// Config tuned for tests: no reconnection, no heartbeat.
pub fn quiet_config() -> ClientConfig {
    ClientConfig::new("ws://scripted")
        .with_auto_reconnect(false)
        .with_heartbeat_interval(Duration::ZERO)
}

/// Connect a client against a single accepted scripted connection.
pub async fn connect_scripted(config: ClientConfig) -> (MprowClient, LinkHandle) {
    let (outcome, handle) = accept();
    let connector = ScriptedConnector::new(vec![outcome]);
    let client = MprowClient::connect_with(config, connector)
        .await
        .expect("scripted connect must succeed");
    (client, handle)
}

/// Encoded success response frame.
pub fn response_frame(id: Id, result: Value) -> Vec<u8> {
    msgpack::encode(&Response::success(result, id).to_value())
}

/// Encoded error response frame.
pub fn error_frame(id: Option<Id>, code: i64, message: &str) -> Vec<u8> {
    msgpack::encode(&Response::error(ErrorData::new(code, message), id).to_value())
}

/// Record every emitted event for later inspection.
pub fn record_events(client: &MprowClient) -> Arc<Mutex<Vec<ClientEvent>>> {
    let log: Arc<Mutex<Vec<ClientEvent>>> = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::Open,
        EventKind::Close,
        EventKind::Error,
        EventKind::Message,
        EventKind::Reconnecting,
        EventKind::Reconnected,
        EventKind::ReconnectFailed,
    ] {
        let log = Arc::clone(&log);
        client.on(kind, move |event| {
            log.lock().unwrap().push(event.clone());
        });
    }
    log
}

/// Poll until `predicate` passes or the deadline expires.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, deadline: Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within {deadline:?}");
}
