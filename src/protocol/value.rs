//! TLV response values.
//!
//! A [`Value`] is one tagged unit on the wire. Scalars are little-endian;
//! strings and errors are length-prefixed byte runs; arrays are a count
//! followed by that many nested values. Each response carries exactly one
//! value inside an outer u32 length frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::MAX_MSG_SIZE;

/// Wire tags. These numbers are the protocol; do not renumber.
pub const TAG_NIL: u8 = 0;
pub const TAG_ERR: u8 = 1;
pub const TAG_STR: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_DBL: u8 = 4;
pub const TAG_ARR: u8 = 5;

/// A complete TLV value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Err(String),
    Str(Bytes),
    Int(i64),
    Dbl(f64),
    Arr(Vec<Value>),
}

impl Value {
    /// An error value from a static or formatted message.
    #[inline]
    pub fn err(msg: impl Into<String>) -> Self {
        Self::Err(msg.into())
    }

    /// A string value copied out of a byte slice.
    #[inline]
    pub fn str(data: impl Into<Bytes>) -> Self {
        Self::Str(data.into())
    }

    /// Append this value's TLV encoding to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Nil => buf.put_u8(TAG_NIL),
            Value::Err(msg) => {
                buf.put_u8(TAG_ERR);
                buf.put_u32_le(msg.len() as u32);
                buf.put_slice(msg.as_bytes());
            }
            Value::Str(data) => {
                buf.put_u8(TAG_STR);
                buf.put_u32_le(data.len() as u32);
                buf.put_slice(data);
            }
            Value::Int(n) => {
                buf.put_u8(TAG_INT);
                buf.put_i64_le(*n);
            }
            Value::Dbl(d) => {
                buf.put_u8(TAG_DBL);
                buf.put_f64_le(*d);
            }
            Value::Arr(items) => {
                buf.put_u8(TAG_ARR);
                buf.put_u32_le(items.len() as u32);
                for item in items {
                    item.encode(buf);
                }
            }
        }
    }

    /// Decode one value from the front of `buf`, advancing it.
    pub fn decode(buf: &mut &[u8]) -> Result<Value, ProtocolError> {
        if buf.remaining() < 1 {
            return Err(ProtocolError::UnexpectedEof);
        }
        match buf.get_u8() {
            TAG_NIL => Ok(Value::Nil),
            TAG_ERR => {
                let data = take_lenprefixed(buf)?;
                let msg = String::from_utf8(data.to_vec())
                    .map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Value::Err(msg))
            }
            TAG_STR => Ok(Value::Str(Bytes::copy_from_slice(take_lenprefixed(buf)?))),
            TAG_INT => {
                if buf.remaining() < 8 {
                    return Err(ProtocolError::UnexpectedEof);
                }
                Ok(Value::Int(buf.get_i64_le()))
            }
            TAG_DBL => {
                if buf.remaining() < 8 {
                    return Err(ProtocolError::UnexpectedEof);
                }
                Ok(Value::Dbl(buf.get_f64_le()))
            }
            TAG_ARR => {
                if buf.remaining() < 4 {
                    return Err(ProtocolError::UnexpectedEof);
                }
                let n = buf.get_u32_le() as usize;
                let mut items = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    items.push(Value::decode(buf)?);
                }
                Ok(Value::Arr(items))
            }
            tag => Err(ProtocolError::InvalidTag(tag)),
        }
    }
}

fn take_lenprefixed<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::UnexpectedEof);
    }
    let len = buf.get_u32_le() as usize;
    let rest = *buf;
    if rest.len() < len {
        return Err(ProtocolError::UnexpectedEof);
    }
    let (head, tail) = rest.split_at(len);
    *buf = tail;
    Ok(head)
}

/// Reserve the 4-byte length frame for a response and return its
/// position; pair with [`frame_end`].
pub fn frame_begin(out: &mut BytesMut) -> usize {
    let header = out.len();
    out.put_u32_le(0);
    header
}

/// Back-patch the length frame opened at `header`. A body over
/// [`MAX_MSG_SIZE`] is discarded and replaced by a single error value so
/// the connection stays well-formed.
pub fn frame_end(out: &mut BytesMut, header: usize) {
    let mut body_len = out.len() - header - 4;
    if body_len > MAX_MSG_SIZE {
        out.truncate(header + 4);
        Value::err("ERR response too big").encode(out);
        body_len = out.len() - header - 4;
    }
    out[header..header + 4].copy_from_slice(&(body_len as u32).to_le_bytes());
}
