//! MessagePack JSON-RPC 2.0 client over WebSocket
//!
//! This crate provides a full client session on top of `mprow-core`:
//! request/response correlation, notifications, server-push streams,
//! per-request timeouts, heartbeats, automatic bounded reconnection, typed
//! events, and performance counters.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mprow_client::MprowClient;
//! use mprow_core::Value;
//!
//! #[tokio::main]
//! async fn main() -> mprow_core::Result<()> {
//!     let client = MprowClient::connect("ws://localhost:8080").await?;
//!
//!     let result = client
//!         .request("user.login", Some(Value::Map(vec![
//!             ("u".to_string(), Value::Str("alice".into())),
//!         ])))
//!         .await?;
//!     println!("logged in: {result:?}");
//!
//!     client.close(None, None).await;
//!     Ok(())
//! }
//! ```
//!
//! # With configuration
//!
//! ```rust,no_run
//! use mprow_client::{ClientConfig, MprowClient};
//! use std::time::Duration;
//!
//! # async fn example() -> mprow_core::Result<()> {
//! let config = ClientConfig::new("ws://localhost:8080")
//!     .with_default_timeout(Duration::from_secs(5))
//!     .with_heartbeat_interval(Duration::from_secs(10))
//!     .with_max_reconnect_attempts(3);
//! let client = MprowClient::connect_with_config(config).await?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod events;
mod ids;
mod logging;
mod reconnect;
mod request;
mod stats;
mod streams;
mod transport;

pub use client::MprowClient;
pub use config::ClientConfig;
pub use events::{ClientEvent, EventBus, EventKind, EventListener, ListenerId};
pub use logging::init_debug_logging;
pub use stats::StatsSnapshot;
pub use streams::StreamController;
pub use transport::{
    ConnectionState, Connector, FrameSink, FrameSource, TransportEvent, WsConnector,
};
