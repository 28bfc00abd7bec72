//! Per-connection state machine.
//!
//! Each connection owns a non-blocking socket and two byte buffers.
//! Readable events append to `incoming` and drain every complete request
//! out of it; writable events drain `outgoing`. The `want_*` flags tell
//! the readiness loop what to wait for next: at most one of `want_read`/
//! `want_write` is asserted at a time, a nonempty `outgoing` implies
//! `want_write`, and `want_close` is sticky.

use bytes::{Buf, BytesMut};
use tokio::io::Interest;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::error::ProtocolError;
use crate::protocol::request;
use crate::protocol::value::{frame_begin, frame_end};
use crate::storage::Dict;
use crate::{commands, MAX_MSG_SIZE};

/// Bytes pulled off the socket per readable event.
const READ_CHUNK: usize = 64 * 1024;

/// One client connection.
pub struct Conn {
    stream: TcpStream,
    incoming: BytesMut,
    outgoing: BytesMut,
    want_read: bool,
    want_write: bool,
    want_close: bool,
}

impl Conn {
    /// Wrap a freshly accepted socket; starts out reading.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            incoming: BytesMut::new(),
            outgoing: BytesMut::new(),
            want_read: true,
            want_write: false,
            want_close: false,
        }
    }

    #[inline]
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Still has work: either the socket stays open, or queued output
    /// must drain before the close.
    #[inline]
    pub fn is_live(&self) -> bool {
        !(self.want_close && self.outgoing.is_empty())
    }

    /// The readiness this connection wants to be woken for.
    #[inline]
    pub fn interest(&self) -> Interest {
        if self.want_write {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    #[inline]
    pub fn wants_read(&self) -> bool {
        self.want_read && !self.want_close
    }

    #[inline]
    pub fn wants_write(&self) -> bool {
        self.want_write
    }

    /// Protocol-fatal: drop buffered input and close once queued output
    /// has drained.
    fn mark_close(&mut self) {
        self.want_close = true;
        self.incoming.clear();
    }

    /// Readable event: pull one chunk, serve every complete request in
    /// the buffer, then flip to writing if responses are queued.
    pub fn handle_read(&mut self, dict: &mut Dict) {
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.try_read(&mut chunk) {
            Ok(0) => {
                if self.incoming.is_empty() {
                    debug!("peer closed connection");
                } else {
                    warn!(
                        buffered = self.incoming.len(),
                        "unexpected EOF inside a request"
                    );
                }
                self.mark_close();
                return;
            }
            Ok(n) => {
                trace!(n, "read");
                self.incoming.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "read failed");
                self.mark_close();
                return;
            }
        }

        while self.try_one_request(dict) {}

        if !self.outgoing.is_empty() {
            self.want_read = false;
            self.want_write = true;
            // The socket is almost always writable; try before sleeping.
            self.handle_write();
        }
    }

    /// Parse and serve a single framed request off `incoming`.
    /// Returns false when the buffer holds no complete frame.
    fn try_one_request(&mut self, dict: &mut Dict) -> bool {
        if self.want_close || self.incoming.len() < 4 {
            return false;
        }
        let mut header = &self.incoming[..4];
        let body_len = header.get_u32_le() as usize;
        if body_len > MAX_MSG_SIZE {
            let err = ProtocolError::MsgTooLong {
                len: body_len,
                max: MAX_MSG_SIZE,
            };
            warn!(error = %err, "dropping connection");
            self.mark_close();
            return false;
        }
        if self.incoming.len() < 4 + body_len {
            return false;
        }

        match request::parse(&self.incoming[4..4 + body_len]) {
            Ok(argv) => {
                let frame = frame_begin(&mut self.outgoing);
                commands::dispatch(dict, &argv, &mut self.outgoing);
                frame_end(&mut self.outgoing, frame);
            }
            Err(e) => {
                warn!(error = %e, "malformed request");
                self.mark_close();
                return false;
            }
        }
        self.incoming.advance(4 + body_len);
        true
    }

    /// Writable event: drain `outgoing`; on empty, flip back to reading.
    pub fn handle_write(&mut self) {
        while !self.outgoing.is_empty() {
            match self.stream.try_write(&self.outgoing) {
                Ok(0) => {
                    warn!("wrote zero bytes, closing");
                    self.outgoing.clear();
                    self.want_close = true;
                    return;
                }
                Ok(n) => {
                    trace!(n, "wrote");
                    self.outgoing.advance(n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "write failed");
                    // The peer is gone; queued responses are undeliverable.
                    self.outgoing.clear();
                    self.want_close = true;
                    return;
                }
            }
        }
        self.want_write = false;
        self.want_read = true;
    }
}
