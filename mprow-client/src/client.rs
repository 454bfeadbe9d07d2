//! MessagePack JSON-RPC client session
//!
//! This module provides the main `MprowClient` type, which owns the frame
//! transport and multiplexes requests, notifications, server-push streams,
//! and heartbeats over it.
//!
//! # Session Lifecycle
//!
//! 1. **Connect**: establish the transport and spawn the driver task
//! 2. **Use**: make requests, send notifications, open streams
//! 3. **Reconnect** (optional): a dropped connection is retried on a fixed
//!    interval up to the configured attempt budget
//! 4. **Close**: `close()` tears everything down; idempotent
//!
//! # Cloning
//!
//! `MprowClient` is cheaply cloneable using `Arc` internally. All clones
//! share the same connection and state, so the client can be used from
//! multiple tasks without extra synchronization.
//!
//! # The driver task
//!
//! One spawned task owns the inbound half of the transport. It decodes and
//! dispatches every frame, notices disconnection, and runs the reconnect
//! schedule. Because it is the only consumer of transport events, a
//! superseded transport can never deliver into the session.

use crate::config::ClientConfig;
use crate::events::{ClientEvent, EventBus, EventKind, ListenerId};
use crate::ids;
use crate::reconnect::ReconnectSchedule;
use crate::request::RequestTracker;
use crate::stats::{ClientStats, StatsSnapshot};
use crate::streams::{StreamController, StreamRegistry};
use crate::transport::{
    ConnectionState, Connector, FrameSink, FrameSource, TransportEvent, WsConnector,
};
use mprow_core::{msgpack, Error, Id, Notification, Request, Response, Result, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;

struct SessionShared {
    connector: Arc<dyn Connector>,
    config: RwLock<ClientConfig>,
    state: RwLock<ConnectionState>,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    requests: RequestTracker,
    streams: StreamRegistry,
    events: EventBus,
    stats: ClientStats,
    heartbeat: StdMutex<Option<AbortHandle>>,
    driver: StdMutex<Option<AbortHandle>>,
    /// Set by `close()`; suppresses reconnection until `reconnect_to_url`.
    user_closed: AtomicBool,
}

/// MessagePack JSON-RPC 2.0 client over a binary frame transport.
#[derive(Clone)]
pub struct MprowClient {
    shared: Arc<SessionShared>,
}

impl MprowClient {
    /// Connect with protocol defaults.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::connect_with_config(ClientConfig::new(url)).await
    }

    /// Connect with explicit configuration over the WebSocket transport.
    pub async fn connect_with_config(config: ClientConfig) -> Result<Self> {
        Self::connect_with(config, Arc::new(WsConnector)).await
    }

    /// Connect with explicit configuration over a caller-supplied
    /// transport, which is how tests drive the session without a network.
    pub async fn connect_with(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        if config.debug {
            crate::logging::init_debug_logging();
        }
        let shared = Arc::new(SessionShared {
            connector,
            config: RwLock::new(config),
            state: RwLock::new(ConnectionState::Closed),
            sink: Mutex::new(None),
            requests: RequestTracker::new(),
            streams: StreamRegistry::new(),
            events: EventBus::new(),
            stats: ClientStats::new(),
            heartbeat: StdMutex::new(None),
            driver: StdMutex::new(None),
            user_closed: AtomicBool::new(false),
        });
        let client = Self { shared };
        client.open_transport().await?;
        Ok(client)
    }

    /// Current mirrored connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.shared.state.read().await
    }

    /// Whether the session is currently open.
    pub async fn is_open(&self) -> bool {
        self.connection_state().await == ConnectionState::Open
    }

    /// Copy of the active configuration.
    pub async fn config(&self) -> ClientConfig {
        self.shared.config.read().await.clone()
    }

    /// Send a request and await its result with the default timeout and a
    /// generated id.
    pub async fn request(
        &self,
        method: impl Into<String> + AsRef<str>,
        params: Option<Value>,
    ) -> Result<Value> {
        self.request_with(method, params, None, None).await
    }

    /// Send a request with an explicit timeout and/or id.
    ///
    /// Fails with [`Error::NotConnected`] unless the session is open. The
    /// returned future resolves when the matching response arrives, and
    /// fails on a server error, on timeout, or when the connection closes
    /// first; whichever happens first releases the pending slot.
    #[tracing::instrument(skip(self, params, id), fields(method = %method.as_ref()))]
    pub async fn request_with(
        &self,
        method: impl Into<String> + AsRef<str>,
        params: Option<Value>,
        timeout: Option<Duration>,
        id: Option<Id>,
    ) -> Result<Value> {
        let method = method.into();
        if !self.is_open().await {
            return Err(Error::NotConnected);
        }
        let id = id.unwrap_or_else(ids::generate);
        let timeout = match timeout {
            Some(t) => t,
            None => self.shared.config.read().await.default_timeout,
        };

        // Register before sending so a fast response cannot race the record
        let rx = self.shared.requests.register(id.clone()).await?;

        let frame = msgpack::encode(&Request::new(method.clone(), params, id.clone()).to_value());
        if let Err(e) = Self::send_frame(&self.shared, frame).await {
            self.shared.requests.discard(&id).await;
            return Err(e);
        }
        self.shared.stats.record_request_sent();
        self.shared
            .requests
            .arm_timeout(&id, timeout, self.shared.stats.clone())
            .await;

        tracing::debug!(id = %id, "request sent, awaiting response");
        match rx.await {
            Ok(outcome) => outcome,
            // The tracker always completes records before dropping them, so
            // a dead channel means the session itself went away.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Send a request with typed parameters and result.
    pub async fn request_typed<P, R>(
        &self,
        method: impl Into<String> + AsRef<str>,
        params: P,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = mprow_core::to_value(&params)?;
        let result = self.request(method, Some(params)).await?;
        mprow_core::from_value(&result)
    }

    /// Send a notification. No id is assigned, no response is expected,
    /// and nothing is tracked.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        if !self.is_open().await {
            return Err(Error::NotConnected);
        }
        Self::send_notification(&self.shared, &method.into(), params).await
    }

    /// Send a notification with typed parameters.
    pub async fn notify_typed<P: Serialize>(
        &self,
        method: impl Into<String>,
        params: P,
    ) -> Result<()> {
        let params = mprow_core::to_value(&params)?;
        self.notify(method, Some(params)).await
    }

    /// Open a server-push stream. The request frame carries `id` (generated
    /// when not supplied), and every inbound frame with that id invokes
    /// `handler` until the returned controller is closed.
    ///
    /// Streams place no pending record: they never time out and do not
    /// count toward the request stats.
    pub async fn stream<F, Fut>(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        id: Option<Id>,
        handler: F,
    ) -> Result<StreamController>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.is_open().await {
            return Err(Error::NotConnected);
        }
        let id = id.unwrap_or_else(ids::generate);
        let controller = self.shared.streams.register(id.clone(), handler).await?;

        let frame = msgpack::encode(&Request::new(method, params, id).to_value());
        if let Err(e) = Self::send_frame(&self.shared, frame).await {
            controller.close().await;
            return Err(e);
        }
        Ok(controller)
    }

    /// Register an event listener.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, listener)
    }

    /// Register an event listener that fires at most once.
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnOnce(&ClientEvent) + Send + 'static,
    {
        self.shared.events.once(kind, listener)
    }

    /// Remove an event listener.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.shared.events.off(kind, id)
    }

    /// Close the session: stop reconnecting, cancel every timer, close the
    /// transport, reject all pending requests as connection-closed, close
    /// all streams, and drop all listeners. Idempotent.
    pub async fn close(&self, code: Option<u16>, reason: Option<&str>) {
        self.shared.user_closed.store(true, Ordering::SeqCst);
        if let Some(driver) = self
            .shared
            .driver
            .lock()
            .expect("driver handle lock poisoned")
            .take()
        {
            driver.abort();
        }
        Self::stop_heartbeat(&self.shared);

        *self.shared.state.write().await = ConnectionState::Closing;
        if let Some(mut sink) = self.shared.sink.lock().await.take() {
            if let Err(e) = sink.close(code.unwrap_or(1000), reason.unwrap_or("")).await {
                tracing::debug!(error = %e, "transport close failed");
            }
        }
        *self.shared.state.write().await = ConnectionState::Closed;

        self.shared.requests.fail_all(Error::ConnectionClosed).await;
        self.shared.streams.close_all().await;
        self.shared.events.clear();
        tracing::info!("session closed");
    }

    /// Close the current connection, swap the endpoint, and connect fresh.
    /// Pending work from the old connection is rejected, reconnection is
    /// re-enabled, and the attempt counting starts over.
    pub async fn reconnect_to_url(&self, url: impl Into<String>) -> Result<()> {
        self.close(None, None).await;
        self.shared.config.write().await.url = url.into();
        self.shared.user_closed.store(false, Ordering::SeqCst);
        self.open_transport().await
    }

    /// Snapshot of the performance counters, with `pending_requests` read
    /// from the live table.
    pub async fn stats(&self) -> StatsSnapshot {
        self.shared
            .stats
            .snapshot(self.shared.requests.len().await)
    }

    /// Establish the transport and spawn the driver task.
    async fn open_transport(&self) -> Result<()> {
        let shared = &self.shared;
        let (url, protocols) = {
            let config = shared.config.read().await;
            (config.url.clone(), config.protocols.clone())
        };
        *shared.state.write().await = ConnectionState::Connecting;
        tracing::info!(url = %url, "connecting");

        match shared.connector.connect(&url, &protocols).await {
            Ok((sink, source)) => {
                *shared.sink.lock().await = Some(sink);
                *shared.state.write().await = ConnectionState::Open;
                Self::start_heartbeat(shared).await;
                shared.events.emit(&ClientEvent::Open);
                tracing::info!("connected");

                let task = tokio::spawn(Self::drive(Arc::clone(shared), source));
                *shared
                    .driver
                    .lock()
                    .expect("driver handle lock poisoned") = Some(task.abort_handle());
                Ok(())
            }
            Err(e) => {
                *shared.state.write().await = ConnectionState::Closed;
                tracing::error!(error = %e, "connect failed");
                shared.events.emit(&ClientEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Driver task: consume transport events until disconnection, then run
    /// the reconnect schedule.
    async fn drive(shared: Arc<SessionShared>, mut source: Box<dyn FrameSource>) {
        loop {
            let (code, reason) = Self::read_until_closed(&shared, source.as_mut()).await;
            tracing::info!(code, reason = %reason, "connection lost");

            // Non-open transition: every timer dies, every pending rejects
            Self::stop_heartbeat(&shared);
            *shared.state.write().await = ConnectionState::Closed;
            *shared.sink.lock().await = None;
            shared.requests.fail_all(Error::ConnectionClosed).await;
            shared.events.emit(&ClientEvent::Close { code, reason });

            let (auto_reconnect, interval, max_attempts) = {
                let config = shared.config.read().await;
                (
                    config.auto_reconnect,
                    config.reconnect_interval,
                    config.max_reconnect_attempts,
                )
            };
            if !auto_reconnect || shared.user_closed.load(Ordering::SeqCst) {
                return;
            }

            let mut schedule = ReconnectSchedule::new(interval, max_attempts);
            loop {
                let Some(delay) = schedule.next_delay() else {
                    tracing::warn!(max_attempts, "reconnect attempts exhausted");
                    shared.events.emit(&ClientEvent::ReconnectFailed);
                    return;
                };
                tokio::time::sleep(delay).await;
                if shared.user_closed.load(Ordering::SeqCst) {
                    return;
                }

                shared.stats.record_reconnect();
                shared.events.emit(&ClientEvent::Reconnecting {
                    attempt: schedule.attempt(),
                    max_attempts,
                });
                let (url, protocols) = {
                    let config = shared.config.read().await;
                    (config.url.clone(), config.protocols.clone())
                };
                tracing::info!(attempt = schedule.attempt(), url = %url, "reconnecting");
                *shared.state.write().await = ConnectionState::Connecting;

                match shared.connector.connect(&url, &protocols).await {
                    Ok((sink, new_source)) => {
                        *shared.sink.lock().await = Some(sink);
                        *shared.state.write().await = ConnectionState::Open;
                        Self::start_heartbeat(&shared).await;
                        shared.events.emit(&ClientEvent::Reconnected);
                        shared.events.emit(&ClientEvent::Open);
                        tracing::info!("reconnected");
                        source = new_source;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt = schedule.attempt(), "reconnect attempt failed");
                        *shared.state.write().await = ConnectionState::Closed;
                        shared.events.emit(&ClientEvent::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Read frames until the transport reports closure, returning the close
    /// code and reason.
    async fn read_until_closed(
        shared: &Arc<SessionShared>,
        source: &mut dyn FrameSource,
    ) -> (u16, String) {
        loop {
            match source.next_event().await {
                Some(TransportEvent::Frame(bytes)) => Self::handle_frame(shared, &bytes).await,
                Some(TransportEvent::Closed { code, reason }) => return (code, reason),
                Some(TransportEvent::Error(message)) => {
                    tracing::error!(error = %message, "transport error");
                    shared.events.emit(&ClientEvent::Error {
                        message: message.clone(),
                    });
                    return (1006, message);
                }
                None => return (1006, String::new()),
            }
        }
    }

    /// Decode and dispatch one inbound frame.
    ///
    /// Dispatch order: a stream match invokes the handler and then emits
    /// `message`; a pending match completes the record and then emits
    /// `message`; everything else (unknown or null id) only emits
    /// `message`. Undecodable frames are logged and dropped.
    async fn handle_frame(shared: &Arc<SessionShared>, bytes: &[u8]) {
        let value = match msgpack::decode(bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "dropping undecodable frame");
                return;
            }
        };
        let response = match Response::from_value(&value) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        shared.stats.record_response_received();
        if response.error.is_some() {
            shared.stats.record_error();
        }

        if let Some(id) = response.id.clone() {
            if let Some(handler) = shared.streams.handler(&id).await {
                handler(response.clone()).await;
                shared.events.emit(&ClientEvent::Message(response));
                return;
            }
            match response.error.clone() {
                Some(error_data) => {
                    shared
                        .requests
                        .complete_failure(&id, Error::Rpc(error_data))
                        .await;
                }
                None => {
                    let result = response.result.clone().unwrap_or(Value::Nil);
                    if let Some(rtt) = shared.requests.complete_success(&id, result).await {
                        shared.stats.record_response_time(rtt);
                    }
                }
            }
            shared.events.emit(&ClientEvent::Message(response));
        } else {
            // Null id: uncorrelated, listeners only
            shared.events.emit(&ClientEvent::Message(response));
        }
    }

    async fn send_frame(shared: &Arc<SessionShared>, frame: Vec<u8>) -> Result<()> {
        let mut sink = shared.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => Err(Error::NotConnected),
        }
    }

    async fn send_notification(
        shared: &Arc<SessionShared>,
        method: &str,
        params: Option<Value>,
    ) -> Result<()> {
        let frame = msgpack::encode(&Notification::new(method, params).to_value());
        Self::send_frame(shared, frame).await
    }

    /// Start the heartbeat timer if configured. Replaces any previous timer.
    async fn start_heartbeat(shared: &Arc<SessionShared>) {
        let (interval, method) = {
            let config = shared.config.read().await;
            (config.heartbeat_interval, config.heartbeat_method.clone())
        };
        if interval.is_zero() {
            return;
        }
        let beat_shared = Arc::clone(shared);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the heartbeat starts
            // one full interval after open
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = Self::send_notification(&beat_shared, &method, None).await {
                    tracing::warn!(error = %e, "heartbeat send failed");
                }
            }
        });
        let previous = shared
            .heartbeat
            .lock()
            .expect("heartbeat handle lock poisoned")
            .replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_heartbeat(shared: &SessionShared) {
        if let Some(task) = shared
            .heartbeat
            .lock()
            .expect("heartbeat handle lock poisoned")
            .take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    // The session is exercised end to end against a scripted transport in
    // the tests/ directory; unit coverage here is limited to what needs no
    // connection at all.

    use super::*;

    #[tokio::test]
    async fn connect_failure_surfaces_the_error() {
        struct RefusingConnector;

        #[async_trait::async_trait]
        impl Connector for RefusingConnector {
            async fn connect(
                &self,
                _url: &str,
                _protocols: &[String],
            ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
                Err(Error::Transport("connection refused".into()))
            }
        }

        let config = ClientConfig::new("ws://nowhere").with_auto_reconnect(false);
        let outcome = MprowClient::connect_with(config, Arc::new(RefusingConnector)).await;
        assert!(matches!(outcome, Err(Error::Transport(_))));
    }
}
