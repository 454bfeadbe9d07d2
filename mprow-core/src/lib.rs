//! Core value model, MessagePack codec, and JSON-RPC 2.0 types for mprow
//!
//! This crate is the transport-agnostic half of mprow. It provides:
//!
//! - **Value model**: the closed tagged union carried over the wire, with
//!   boundary conversions from host types and serde_json
//! - **Codec**: a purpose-built MessagePack serializer/deserializer with a
//!   dedicated UTF-8 fast-path string codec
//! - **Types**: JSON-RPC 2.0 request, notification, and response shapes
//! - **Errors**: caller-facing error kinds and precise decode diagnostics
//!
//! The `mprow-client` crate builds the session (correlation, streams,
//! heartbeats, reconnection) on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use mprow_core::{msgpack, Id, Request, Value};
//!
//! let request = Request::new("add", Some(Value::Array(vec![
//!     Value::Int(5),
//!     Value::Int(3),
//! ])), Id::Num(1));
//!
//! let frame = msgpack::encode(&request.to_value());
//! let decoded = msgpack::decode(&frame).unwrap();
//! assert_eq!(decoded.get("method").and_then(Value::as_str), Some("add"));
//! ```

pub mod buffer;
pub mod error;
pub mod msgpack;
pub mod types;
pub mod utf8;
pub mod value;

pub use error::{codes, DecodeError, Error, ErrorData, Result};
pub use types::{Id, Notification, Request, Response, PROTOCOL_VERSION};
pub use value::{from_value, to_value, Ext, Value};
