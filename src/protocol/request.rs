//! Request body grammar.
//!
//! A request body is `u32 nstr | (u32 len | bytes){nstr}`, little-endian.
//! The outer length frame has already been stripped by the connection;
//! this parser only sees exactly one body and must consume all of it.

use bytes::{Buf, Bytes};

use crate::error::ProtocolError;
use crate::MAX_ARGS;

/// Parse one request body into its argument strings.
///
/// Fails if the string count exceeds [`MAX_ARGS`], any length runs past
/// the end of the body, or bytes remain after the last string. A parse
/// failure is protocol-fatal for the connection.
pub fn parse(body: &[u8]) -> Result<Vec<Bytes>, ProtocolError> {
    let mut buf = body;
    if buf.remaining() < 4 {
        return Err(ProtocolError::UnexpectedEof);
    }
    let nstr = buf.get_u32_le() as usize;
    if nstr > MAX_ARGS {
        return Err(ProtocolError::TooManyArgs {
            count: nstr,
            max: MAX_ARGS,
        });
    }
    let mut argv = Vec::with_capacity(nstr);
    for _ in 0..nstr {
        if buf.remaining() < 4 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        argv.push(Bytes::copy_from_slice(&buf[..len]));
        buf.advance(len);
    }
    if buf.has_remaining() {
        return Err(ProtocolError::TrailingBytes);
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn body(args: &[&[u8]]) -> Vec<u8> {
        let mut out = BytesMut::new();
        out.put_u32_le(args.len() as u32);
        for a in args {
            out.put_u32_le(a.len() as u32);
            out.put_slice(a);
        }
        out.to_vec()
    }

    #[test]
    fn parses_argument_vectors() {
        let argv = parse(&body(&[b"set", b"foo", b"bar"])).unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[0].as_ref(), b"set");
        assert_eq!(argv[2].as_ref(), b"bar");

        let empty = parse(&body(&[])).unwrap();
        assert!(empty.is_empty(), "nstr=0 is well-formed");
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert_eq!(parse(&[]), Err(ProtocolError::UnexpectedEof));
        assert_eq!(parse(&[1, 0, 0]), Err(ProtocolError::UnexpectedEof));

        // One string promised, its length runs past the body.
        let mut b = body(&[b"hi"]);
        b.truncate(b.len() - 1);
        assert_eq!(parse(&b), Err(ProtocolError::UnexpectedEof));

        // Garbage after the last string.
        let mut b = body(&[b"hi"]);
        b.push(0xAA);
        assert_eq!(parse(&b), Err(ProtocolError::TrailingBytes));
    }

    #[test]
    fn rejects_excessive_argument_counts() {
        let mut b = Vec::new();
        b.extend_from_slice(&(MAX_ARGS as u32 + 1).to_le_bytes());
        assert!(matches!(
            parse(&b),
            Err(ProtocolError::TooManyArgs { .. })
        ));
    }

    #[test]
    fn preserves_binary_arguments() {
        let blob: Vec<u8> = (0..=255).collect();
        let argv = parse(&body(&[b"set", &blob, b""])).unwrap();
        assert_eq!(argv[1].as_ref(), &blob[..]);
        assert!(argv[2].is_empty());
    }
}
