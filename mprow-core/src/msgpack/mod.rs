//! MessagePack serialization and deserialization
//!
//! This is a purpose-built codec for the [`Value`](crate::value::Value)
//! universe rather than a binding to a generic serde backend, because the
//! session and its peers agree on exact byte-level framing:
//!
//! - integers are written at the narrowest width that holds them, falling
//!   back to the 9-byte uint64 / int64 forms at the top of the range;
//! - binary payloads always use the `0xC4`/`0xC5`/`0xC6` headers (there is
//!   no fixbin form, even for one-byte payloads);
//! - time points use extension type 0xFF in its 4-, 8-, or 12-byte layout
//!   depending on range and sub-second precision;
//! - the reader bounds-checks every read and reports the exact offset,
//!   attempted width, and remaining byte count on underrun.

mod decode;
mod encode;

pub use decode::{decode, decode_multiple};
pub use encode::{encode, encode_multiple};
