//! JSON-RPC 2.0 message shapes
//!
//! The three message shapes carried over the frame transport, expressed over
//! the wire [`Value`] model:
//!
//! 1. **Request**: a call that expects a response, correlated by `id`
//! 2. **Notification**: a call with no `id` member and no response
//! 3. **Response**: `result` or `error` plus the originating `id`
//!
//! `to_value` builds the outbound map shape (optional members are elided,
//! never written as nil) and `Response::from_value` parses inbound frames.
//! Field order on the wire is irrelevant; `jsonrpc` is always the string
//! `"2.0"`.

use crate::error::{DecodeError, ErrorData};
use crate::value::Value;
use std::fmt;

/// The protocol version string stamped on every message.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Request correlation id.
///
/// The id is used directly as the key of the pending-request table.
/// Because the two variants are distinct enum cases, a string `"7"` and a
/// number `7` can never collide, which is what makes mixing caller-supplied
/// and generated ids safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
    /// String identifier (generated ids are UUID strings)
    Str(String),
    /// Numeric identifier
    Num(i64),
}

impl Id {
    /// Wire representation of the id.
    pub fn to_value(&self) -> Value {
        match self {
            Id::Str(s) => Value::Str(s.clone()),
            Id::Num(n) => Value::Int(*n),
        }
    }

    /// Parse an id member. Nil maps to `None` (an uncorrelated frame).
    pub fn from_value(value: &Value) -> Result<Option<Self>, DecodeError> {
        match value {
            Value::Nil => Ok(None),
            Value::Str(s) => Ok(Some(Id::Str(s.clone()))),
            Value::Int(n) => Ok(Some(Id::Num(*n))),
            other => Err(DecodeError::Malformed(format!(
                "id must be a string, integer, or nil, got {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Str(s) => write!(f, "\"{s}\""),
            Id::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Str(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::Str(s)
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Num(n)
    }
}

/// A call that expects a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Remote method name.
    pub method: String,
    /// Optional parameters; elided from the wire map when absent.
    pub params: Option<Value>,
    /// Correlation id.
    pub id: Id,
}

impl Request {
    /// Create a request. The version member is stamped at encode time.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// Build the outbound wire shape.
    pub fn to_value(&self) -> Value {
        let mut members = vec![
            (
                "jsonrpc".to_string(),
                Value::Str(PROTOCOL_VERSION.to_string()),
            ),
            ("method".to_string(), Value::Str(self.method.clone())),
        ];
        if let Some(params) = &self.params {
            members.push(("params".to_string(), params.clone()));
        }
        members.push(("id".to_string(), self.id.to_value()));
        Value::Map(members)
    }
}

/// A call with no response expected. The wire map carries no `id` member at
/// all, which is what distinguishes it from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Remote method or event name.
    pub method: String,
    /// Optional parameters; elided when absent.
    pub params: Option<Value>,
}

impl Notification {
    /// Create a notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Build the outbound wire shape.
    pub fn to_value(&self) -> Value {
        let mut members = vec![
            (
                "jsonrpc".to_string(),
                Value::Str(PROTOCOL_VERSION.to_string()),
            ),
            ("method".to_string(), Value::Str(self.method.clone())),
        ];
        if let Some(params) = &self.params {
            members.push(("params".to_string(), params.clone()));
        }
        Value::Map(members)
    }
}

/// An inbound frame: `result` or `error`, plus the originating id.
///
/// `id` is `None` when the wire carried nil or no id member; such frames are
/// uncorrelated and only reach `message` event listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Successful result payload.
    pub result: Option<Value>,
    /// Error payload; mutually exclusive with `result` on a well-behaved
    /// peer, though this client tolerates both being present.
    pub error: Option<ErrorData>,
    /// Correlation id, if any.
    pub id: Option<Id>,
}

impl Response {
    /// Create a success response (used by tests and mock peers).
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Create an error response (used by tests and mock peers).
    pub fn error(error: ErrorData, id: Option<Id>) -> Self {
        Self {
            result: None,
            error: Some(error),
            id,
        }
    }

    /// True when a result member is present.
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// True when an error member is present.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Build the wire shape (mock-peer side).
    pub fn to_value(&self) -> Value {
        let mut members = vec![(
            "jsonrpc".to_string(),
            Value::Str(PROTOCOL_VERSION.to_string()),
        )];
        if let Some(result) = &self.result {
            members.push(("result".to_string(), result.clone()));
        }
        if let Some(error) = &self.error {
            members.push(("error".to_string(), error.to_value()));
        }
        members.push((
            "id".to_string(),
            self.id.as_ref().map(Id::to_value).unwrap_or(Value::Nil),
        ));
        Value::Map(members)
    }

    /// Parse an inbound frame. Unknown members are ignored; a frame that is
    /// not a map, or whose `error` or `id` members are mis-typed, is
    /// malformed and gets dropped by the session.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let Value::Map(members) = value else {
            return Err(DecodeError::Malformed(format!(
                "message must be a map, got {}",
                value.type_name()
            )));
        };
        let mut result = None;
        let mut error = None;
        let mut id = None;
        for (key, member) in members {
            match key.as_str() {
                "result" => result = Some(member.clone()),
                "error" => error = Some(ErrorData::from_value(member)?),
                "id" => id = Id::from_value(member)?,
                _ => {}
            }
        }
        Ok(Self { result, error, id })
    }
}
