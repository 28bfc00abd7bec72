//! Error types for the ordo server.

use std::io;
use std::net::AddrParseError;
use thiserror::Error;

/// Result type alias for ordo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for server and client-facing library calls.
///
/// Wire-level problems never surface here as values: the command layer
/// and codec answer with TLV error frames, and the connection state
/// machine turns transport faults into a closed socket. This type covers
/// the remaining internal paths: socket setup, accept/readiness failures,
/// and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Request framing or grammar violation
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener address parsing error
    #[error("address parse error: {0}")]
    AddrParse(#[from] AddrParseError),
}

/// Violations of the wire grammar. All of these are fatal for the
/// connection that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Body length field exceeds the message cap
    #[error("message too long: {len} bytes (max: {max})")]
    MsgTooLong {
        /// Declared body length
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Argument count field exceeds the cap
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArgs {
        /// Declared argument count
        count: usize,
        /// Maximum allowed count
        max: usize,
    },

    /// A length field runs past the end of the body
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes left over after the last argument
    #[error("trailing bytes after request body")]
    TrailingBytes,

    /// Unknown TLV tag
    #[error("invalid type tag: {0}")]
    InvalidTag(u8),

    /// Error message with invalid UTF-8
    #[error("invalid UTF-8 in error value")]
    InvalidUtf8,
}
