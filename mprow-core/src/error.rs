//! Error types for mprow
//!
//! Two tiers of errors live here:
//!
//! - **`Error`**: the kinds surfaced to callers of the client (not connected,
//!   timeout, server-side RPC error, connection closed, and so on).
//! - **`DecodeError`**: precise MessagePack and UTF-8 parse failures. These
//!   never reach callers of the client directly; an inbound frame that fails
//!   to decode is logged and dropped, because letting one bad frame poison
//!   the whole session would be far worse than losing the frame.
//!
//! `ErrorData` is the wire-format error object carried in the `error` member
//! of a JSON-RPC response. It travels in both directions conceptually, but
//! this client only ever receives it.

use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// Result type used throughout the mprow crates.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC 2.0 error codes known to the client.
///
/// The `-32700..-32603` range comes from the JSON-RPC 2.0 specification.
/// `TIMEOUT` and `CONNECTION_CLOSED` are client-local extensions synthesized
/// when a request dies without a server response.
pub mod codes {
    /// Invalid MessagePack / malformed payload.
    pub const PARSE_ERROR: i64 = -32700;
    /// The message is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The requested method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The method exists but the parameters are wrong.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal server failure.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Implementation-defined server error.
    pub const SERVER_ERROR: i64 = -32000;
    /// Client-synthesized: no response within the deadline.
    pub const TIMEOUT: i64 = -32001;
    /// Client-synthesized: the transport closed while the request was pending.
    pub const CONNECTION_CLOSED: i64 = -32002;
}

/// Caller-facing error for client operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An operation that requires an open connection was attempted while the
    /// session was not in the `Open` state.
    #[error("not connected")]
    NotConnected,

    /// No response arrived within the request deadline.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an error object.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(#[from] ErrorData),

    /// The transport closed while the request was still pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// Outbound conversion to the wire value model failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying frame transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request id was supplied that is already in flight.
    #[error("duplicate request id: {0}")]
    DuplicateId(crate::types::Id),
}

/// Wire-format JSON-RPC error object (`code`, `message`, optional `data`).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorData {
    /// Numeric error code.
    pub code: i64,
    /// Short human-readable description.
    pub message: String,
    /// Optional structured context supplied by the server.
    pub data: Option<Value>,
}

impl ErrorData {
    /// Create an error object with a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object carrying additional structured data.
    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Client-synthesized timeout error (`-32001`).
    pub fn timeout() -> Self {
        Self::new(codes::TIMEOUT, "Request timed out")
    }

    /// Client-synthesized connection-closed error (`-32002`).
    pub fn connection_closed() -> Self {
        Self::new(codes::CONNECTION_CLOSED, "Connection closed")
    }

    /// Parse error (`-32700`).
    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error")
    }

    /// Method not found (`-32601`).
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Convert to the wire value shape. The `data` member is elided when
    /// absent.
    pub fn to_value(&self) -> Value {
        let mut members = vec![
            ("code".to_string(), Value::Int(self.code)),
            ("message".to_string(), Value::Str(self.message.clone())),
        ];
        if let Some(data) = &self.data {
            members.push(("data".to_string(), data.clone()));
        }
        Value::Map(members)
    }

    /// Parse the wire value shape. `code` must be an integer and `message` a
    /// string; anything else is a malformed frame.
    pub fn from_value(value: &Value) -> std::result::Result<Self, DecodeError> {
        let Value::Map(members) = value else {
            return Err(DecodeError::Malformed(format!(
                "error member must be a map, got {}",
                value.type_name()
            )));
        };
        let mut code = None;
        let mut message = None;
        let mut data = None;
        for (key, member) in members {
            match key.as_str() {
                "code" => match member {
                    Value::Int(c) => code = Some(*c),
                    other => {
                        return Err(DecodeError::Malformed(format!(
                            "error code must be an integer, got {}",
                            other.type_name()
                        )))
                    }
                },
                "message" => match member {
                    Value::Str(m) => message = Some(m.clone()),
                    other => {
                        return Err(DecodeError::Malformed(format!(
                            "error message must be a string, got {}",
                            other.type_name()
                        )))
                    }
                },
                "data" => data = Some(member.clone()),
                _ => {}
            }
        }
        match (code, message) {
            (Some(code), Some(message)) => Ok(Self {
                code,
                message,
                data,
            }),
            _ => Err(DecodeError::Malformed(
                "error member missing code or message".to_string(),
            )),
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorData {}

/// MessagePack and UTF-8 decode failures.
///
/// Every variant carries enough position context to pinpoint the offending
/// byte in the input frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input was empty.
    #[error("empty input")]
    EmptyInput,

    /// A read ran past the end of the buffer.
    #[error("incomplete input: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    UnexpectedEnd {
        /// Width of the attempted read.
        needed: usize,
        /// Offset at which the read started.
        offset: usize,
        /// Bytes left in the buffer at that offset.
        remaining: usize,
    },

    /// A byte that is not a defined MessagePack type tag (0xC1 is reserved).
    #[error("invalid type tag {tag:#04x} at offset {offset}")]
    InvalidTag {
        /// The offending byte.
        tag: u8,
        /// Its position in the input.
        offset: usize,
    },

    /// A map key decoded to something other than a string.
    #[error("map key at offset {offset} is not a string, got {found}")]
    NonStringKey {
        /// Position of the key in the input.
        offset: usize,
        /// Type name of the decoded key.
        found: &'static str,
    },

    /// A multi-byte UTF-8 sequence was cut short.
    #[error("incomplete {width}-byte UTF-8 sequence at offset {offset}")]
    IncompleteUtf8 {
        /// Expected width of the sequence.
        width: usize,
        /// Offset of the lead byte.
        offset: usize,
    },

    /// A decoded code point exceeds U+10FFFF.
    #[error("code point {value:#x} at offset {offset} exceeds U+10FFFF")]
    CodePointTooLarge {
        /// The out-of-range value.
        value: u32,
        /// Offset of the lead byte.
        offset: usize,
    },

    /// A decoded code point is not a Unicode scalar value.
    #[error("invalid code point {value:#x} at offset {offset}")]
    InvalidCodePoint {
        /// The unrepresentable value.
        value: u32,
        /// Offset of the lead byte.
        offset: usize,
    },

    /// A 0xFF extension payload with a length other than 4, 8, or 12.
    #[error("timestamp extension has invalid length {len}")]
    InvalidTimestampLength {
        /// The payload length found.
        len: usize,
    },

    /// A timestamp payload that does not map to a representable time point.
    #[error("timestamp out of range: {seconds} seconds")]
    TimestampOutOfRange {
        /// The seconds component of the rejected timestamp.
        seconds: i64,
    },

    /// A structurally invalid JSON-RPC message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes() {
        assert_eq!(codes::PARSE_ERROR, -32700);
        assert_eq!(codes::INVALID_REQUEST, -32600);
        assert_eq!(codes::METHOD_NOT_FOUND, -32601);
        assert_eq!(codes::INVALID_PARAMS, -32602);
        assert_eq!(codes::INTERNAL_ERROR, -32603);
        assert_eq!(codes::SERVER_ERROR, -32000);
        assert_eq!(codes::TIMEOUT, -32001);
        assert_eq!(codes::CONNECTION_CLOSED, -32002);
    }

    #[test]
    fn error_data_display() {
        let data = ErrorData::method_not_found("user.login");
        let rendered = data.to_string();
        assert!(rendered.contains("-32601"));
        assert!(rendered.contains("user.login"));
    }

    #[test]
    fn rpc_error_message_carries_code_and_text() {
        let err = Error::Rpc(ErrorData::new(-32601, "no such method"));
        let rendered = err.to_string();
        assert!(rendered.contains("-32601"));
        assert!(rendered.contains("no such method"));
    }

    #[test]
    fn error_data_value_round_trip() {
        let data = ErrorData::with_data(-32000, "boom", Value::Str("ctx".into()));
        let parsed = ErrorData::from_value(&data.to_value()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn error_data_elides_absent_data_member() {
        let data = ErrorData::timeout();
        let Value::Map(members) = data.to_value() else {
            panic!("expected map");
        };
        assert!(members.iter().all(|(k, _)| k != "data"));
    }

    #[test]
    fn error_data_rejects_bad_code_type() {
        let value = Value::Map(vec![
            ("code".to_string(), Value::Str("oops".into())),
            ("message".to_string(), Value::Str("m".into())),
        ]);
        assert!(matches!(
            ErrorData::from_value(&value),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn decode_error_messages_name_positions() {
        let err = DecodeError::UnexpectedEnd {
            needed: 4,
            offset: 7,
            remaining: 2,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("incomplete"));
        assert!(rendered.contains('4'));
        assert!(rendered.contains('7'));
        assert!(rendered.contains('2'));
    }
}
