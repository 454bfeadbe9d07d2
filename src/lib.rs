//! MPROW - MessagePack JSON-RPC 2.0 Over WebSocket
//!
//! This is the convenience crate that re-exports the MPROW sub-crates.
//! Use it if you want a single dependency for the whole stack.
//!
//! # Architecture
//!
//! MPROW is organized into modular crates:
//!
//! - **mprow-core**: value model, MessagePack codec, JSON-RPC types, errors
//! - **mprow-client**: WebSocket client session with correlation, streams,
//!   heartbeats, and reconnection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mprow::MprowClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MprowClient::connect("ws://localhost:8080").await?;
//!
//!     let result = client.request("ping", None).await?;
//!     println!("pong: {result:?}");
//!
//!     client.close(None, None).await;
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under stable module names
pub use mprow_client as client;
pub use mprow_core as core;

// Convenience re-exports of the most commonly used types
pub use mprow_client::{ClientConfig, ClientEvent, EventKind, MprowClient, StreamController};
pub use mprow_core::{Error, Id, Result, Value};
