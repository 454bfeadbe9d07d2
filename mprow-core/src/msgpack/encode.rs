//! MessagePack serializer
//!
//! Encodes a [`Value`] tree into its wire bytes. Encoding is infallible:
//! the closed value universe leaves nothing unserializable (non-finite
//! floats are legal float64 payloads).

use crate::buffer::ByteBuffer;
use crate::utf8;
use crate::value::{Ext, Value};
use chrono::{DateTime, Utc};

/// Encode a single value.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = ByteBuffer::new();
    write_value(value, &mut out);
    out.into_vec()
}

/// Encode a sequence of values as the concatenation of their encodings.
pub fn encode_multiple(values: &[Value]) -> Vec<u8> {
    let mut out = ByteBuffer::new();
    for value in values {
        write_value(value, &mut out);
    }
    out.into_vec()
}

fn write_value(value: &Value, out: &mut ByteBuffer) {
    match value {
        Value::Nil => out.put_u8(0xC0),
        Value::Bool(false) => out.put_u8(0xC2),
        Value::Bool(true) => out.put_u8(0xC3),
        Value::Int(n) => write_int(*n, out),
        Value::Float(f) => {
            out.put_u8(0xCB);
            out.put_slice(&f.to_be_bytes());
        }
        Value::Str(s) => write_str(s, out),
        Value::Bin(bytes) => write_bin(bytes, out),
        Value::Array(items) => {
            write_array_header(items.len(), out);
            for item in items {
                write_value(item, out);
            }
        }
        Value::Map(entries) => {
            write_map_header(entries.len(), out);
            for (key, member) in entries {
                write_str(key, out);
                write_value(member, out);
            }
        }
        Value::Date(date) => write_date(date, out),
        Value::Ext(ext) => write_ext(ext, out),
    }
}

/// Narrowest-width integer encoding. Values past the 32-bit forms use the
/// 9-byte uint64 / int64 encodings.
fn write_int(n: i64, out: &mut ByteBuffer) {
    if n >= 0 {
        if n <= 0x7F {
            out.put_u8(n as u8);
        } else if n <= 0xFF {
            out.put_u8(0xCC);
            out.put_u8(n as u8);
        } else if n <= 0xFFFF {
            out.put_u8(0xCD);
            out.put_slice(&(n as u16).to_be_bytes());
        } else if n <= 0xFFFF_FFFF {
            out.put_u8(0xCE);
            out.put_slice(&(n as u32).to_be_bytes());
        } else {
            out.put_u8(0xCF);
            out.put_slice(&(n as u64).to_be_bytes());
        }
    } else if n >= -0x20 {
        out.put_u8(n as i8 as u8);
    } else if n >= -0x80 {
        out.put_u8(0xD0);
        out.put_u8(n as i8 as u8);
    } else if n >= -0x8000 {
        out.put_u8(0xD1);
        out.put_slice(&(n as i16).to_be_bytes());
    } else if n >= -0x8000_0000 {
        out.put_u8(0xD2);
        out.put_slice(&(n as i32).to_be_bytes());
    } else {
        out.put_u8(0xD3);
        out.put_slice(&n.to_be_bytes());
    }
}

fn write_str(s: &str, out: &mut ByteBuffer) {
    let len = utf8::encoded_len(s);
    if len <= 31 {
        out.put_u8(0xA0 | len as u8);
    } else if len <= 0xFF {
        out.put_u8(0xD9);
        out.put_u8(len as u8);
    } else if len <= 0xFFFF {
        out.put_u8(0xDA);
        out.put_slice(&(len as u16).to_be_bytes());
    } else {
        out.put_u8(0xDB);
        out.put_slice(&(len as u32).to_be_bytes());
    }
    utf8::encode_into(s, out);
}

// No fixbin form exists; one-byte payloads still get the 0xC4 header.
fn write_bin(bytes: &[u8], out: &mut ByteBuffer) {
    let len = bytes.len();
    if len <= 0xFF {
        out.put_u8(0xC4);
        out.put_u8(len as u8);
    } else if len <= 0xFFFF {
        out.put_u8(0xC5);
        out.put_slice(&(len as u16).to_be_bytes());
    } else {
        out.put_u8(0xC6);
        out.put_slice(&(len as u32).to_be_bytes());
    }
    out.put_slice(bytes);
}

fn write_array_header(len: usize, out: &mut ByteBuffer) {
    if len <= 15 {
        out.put_u8(0x90 | len as u8);
    } else if len <= 0xFFFF {
        out.put_u8(0xDC);
        out.put_slice(&(len as u16).to_be_bytes());
    } else {
        out.put_u8(0xDD);
        out.put_slice(&(len as u32).to_be_bytes());
    }
}

fn write_map_header(len: usize, out: &mut ByteBuffer) {
    if len <= 15 {
        out.put_u8(0x80 | len as u8);
    } else if len <= 0xFFFF {
        out.put_u8(0xDE);
        out.put_slice(&(len as u16).to_be_bytes());
    } else {
        out.put_u8(0xDF);
        out.put_slice(&(len as u32).to_be_bytes());
    }
}

/// Timestamp extension 0xFF in one of its three layouts:
///
/// - fixext4 when the sub-second part is zero and the seconds fit u32;
/// - fixext8 (30-bit nanoseconds, 34-bit seconds) while the seconds fit
///   34 bits;
/// - 12-byte ext8 (u32 nanoseconds, i64 seconds) for everything else,
///   including pre-epoch times.
fn write_date(date: &DateTime<Utc>, out: &mut ByteBuffer) {
    let seconds = date.timestamp();
    let nanos = date.timestamp_subsec_nanos();
    if nanos == 0 && (0..=i64::from(u32::MAX)).contains(&seconds) {
        out.put_u8(0xD6);
        out.put_u8(0xFF);
        out.put_slice(&(seconds as u32).to_be_bytes());
    } else if (0..1i64 << 34).contains(&seconds) {
        let packed = (u64::from(nanos) << 34) | seconds as u64;
        out.put_u8(0xD7);
        out.put_u8(0xFF);
        out.put_slice(&packed.to_be_bytes());
    } else {
        out.put_u8(0xC7);
        out.put_u8(12);
        out.put_u8(0xFF);
        out.put_slice(&nanos.to_be_bytes());
        out.put_slice(&seconds.to_be_bytes());
    }
}

fn write_ext(ext: &Ext, out: &mut ByteBuffer) {
    let len = ext.data.len();
    match len {
        1 => out.put_u8(0xD4),
        2 => out.put_u8(0xD5),
        4 => out.put_u8(0xD6),
        8 => out.put_u8(0xD7),
        16 => out.put_u8(0xD8),
        _ if len <= 0xFF => {
            out.put_u8(0xC7);
            out.put_u8(len as u8);
        }
        _ if len <= 0xFFFF => {
            out.put_u8(0xC8);
            out.put_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            out.put_u8(0xC9);
            out.put_slice(&(len as u32).to_be_bytes());
        }
    }
    out.put_u8(ext.type_code as u8);
    out.put_slice(&ext.data);
}
