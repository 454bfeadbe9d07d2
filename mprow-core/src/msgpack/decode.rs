//! MessagePack deserializer
//!
//! A single-pass recursive reader over a byte slice. Every read is
//! bounds-checked before the cursor advances, so a truncated or hostile
//! frame fails with a precise error instead of a panic or a silent value.

use crate::error::DecodeError;
use crate::utf8;
use crate::value::{Ext, Value};
use chrono::DateTime;

/// Decode a single value from `input`.
///
/// Trailing bytes after the first value are ignored; use
/// [`decode_multiple`] to drain a buffer of concatenated values.
pub fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    if input.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    let mut reader = Reader::new(input);
    reader.read_value()
}

/// Decode values until the buffer is exhausted.
pub fn decode_multiple(input: &[u8]) -> Result<Vec<Value>, DecodeError> {
    if input.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    let mut reader = Reader::new(input);
    let mut values = Vec::new();
    while !reader.is_at_end() {
        values.push(reader.read_value()?);
    }
    Ok(values)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Take `n` bytes, failing with the attempted width, current offset,
    /// and remaining byte count on underrun.
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(DecodeError::UnexpectedEnd {
                needed: n,
                offset: self.pos,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    fn read_str(&mut self, len: usize) -> Result<String, DecodeError> {
        let start = self.pos;
        self.take(len)?;
        utf8::decode(self.buf, start, len)
    }

    fn read_array(&mut self, len: usize) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        Ok(Value::Array(items))
    }

    fn read_map(&mut self, len: usize) -> Result<Value, DecodeError> {
        let mut entries = Vec::new();
        for _ in 0..len {
            let key_offset = self.pos;
            let key = match self.read_value()? {
                Value::Str(s) => s,
                other => {
                    return Err(DecodeError::NonStringKey {
                        offset: key_offset,
                        found: other.type_name(),
                    })
                }
            };
            let member = self.read_value()?;
            entries.push((key, member));
        }
        Ok(Value::Map(entries))
    }

    fn read_ext(&mut self, len: usize) -> Result<Value, DecodeError> {
        let type_code = self.read_u8()? as i8;
        let data = self.take(len)?.to_vec();
        if type_code == -1 {
            return decode_timestamp(&data);
        }
        Ok(Value::Ext(Ext { type_code, data }))
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let tag_offset = self.pos;
        let tag = self.read_u8()?;
        match tag {
            0x00..=0x7F => Ok(Value::Int(i64::from(tag))),
            0x80..=0x8F => self.read_map(usize::from(tag & 0x0F)),
            0x90..=0x9F => self.read_array(usize::from(tag & 0x0F)),
            0xA0..=0xBF => Ok(Value::Str(self.read_str(usize::from(tag & 0x1F))?)),
            0xC0 => Ok(Value::Nil),
            0xC1 => Err(DecodeError::InvalidTag {
                tag,
                offset: tag_offset,
            }),
            0xC2 => Ok(Value::Bool(false)),
            0xC3 => Ok(Value::Bool(true)),
            0xC4 => {
                let len = usize::from(self.read_u8()?);
                Ok(Value::Bin(self.take(len)?.to_vec()))
            }
            0xC5 => {
                let len = usize::from(self.read_u16()?);
                Ok(Value::Bin(self.take(len)?.to_vec()))
            }
            0xC6 => {
                let len = self.read_u32()? as usize;
                Ok(Value::Bin(self.take(len)?.to_vec()))
            }
            0xC7 => {
                let len = usize::from(self.read_u8()?);
                self.read_ext(len)
            }
            0xC8 => {
                let len = usize::from(self.read_u16()?);
                self.read_ext(len)
            }
            0xC9 => {
                let len = self.read_u32()? as usize;
                self.read_ext(len)
            }
            0xCA => Ok(Value::Float(f64::from(self.read_f32()?))),
            0xCB => Ok(Value::Float(self.read_f64()?)),
            0xCC => Ok(Value::Int(i64::from(self.read_u8()?))),
            0xCD => Ok(Value::Int(i64::from(self.read_u16()?))),
            0xCE => Ok(Value::Int(i64::from(self.read_u32()?))),
            0xCF => {
                let raw = self.read_u64()?;
                // Values past i64::MAX widen to float, the same precision
                // ceiling the peer's number type imposes.
                match i64::try_from(raw) {
                    Ok(n) => Ok(Value::Int(n)),
                    Err(_) => Ok(Value::Float(raw as f64)),
                }
            }
            0xD0 => Ok(Value::Int(i64::from(self.read_u8()? as i8))),
            0xD1 => Ok(Value::Int(i64::from(self.read_u16()? as i16))),
            0xD2 => Ok(Value::Int(i64::from(self.read_u32()? as i32))),
            0xD3 => Ok(Value::Int(self.read_i64()?)),
            0xD4 => self.read_ext(1),
            0xD5 => self.read_ext(2),
            0xD6 => self.read_ext(4),
            0xD7 => self.read_ext(8),
            0xD8 => self.read_ext(16),
            0xD9 => {
                let len = usize::from(self.read_u8()?);
                Ok(Value::Str(self.read_str(len)?))
            }
            0xDA => {
                let len = usize::from(self.read_u16()?);
                Ok(Value::Str(self.read_str(len)?))
            }
            0xDB => {
                let len = self.read_u32()? as usize;
                Ok(Value::Str(self.read_str(len)?))
            }
            0xDC => {
                let len = usize::from(self.read_u16()?);
                self.read_array(len)
            }
            0xDD => {
                let len = self.read_u32()? as usize;
                self.read_array(len)
            }
            0xDE => {
                let len = usize::from(self.read_u16()?);
                self.read_map(len)
            }
            0xDF => {
                let len = self.read_u32()? as usize;
                self.read_map(len)
            }
            0xE0..=0xFF => Ok(Value::Int(i64::from(tag as i8))),
        }
    }
}

/// Extension type 0xFF payloads: 4 bytes (u32 seconds), 8 bytes (30-bit
/// nanoseconds over 34-bit seconds), or 12 bytes (u32 nanoseconds, i64
/// seconds).
fn decode_timestamp(data: &[u8]) -> Result<Value, DecodeError> {
    let (seconds, nanos) = match data.len() {
        4 => {
            let secs = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            (i64::from(secs), 0u32)
        }
        8 => {
            let packed = u64::from_be_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ]);
            ((packed & 0x3_FFFF_FFFF) as i64, (packed >> 34) as u32)
        }
        12 => {
            let nanos = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            let secs = i64::from_be_bytes([
                data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
            ]);
            (secs, nanos)
        }
        len => return Err(DecodeError::InvalidTimestampLength { len }),
    };
    DateTime::from_timestamp(seconds, nanos)
        .map(Value::Date)
        .ok_or(DecodeError::TimestampOutOfRange { seconds })
}
