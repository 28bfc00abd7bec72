//! # Ordo
//!
//! A single-process, in-memory key-value server over TCP.
//!
//! Clients send length-framed argument vectors and receive tagged,
//! length-framed values. One thread multiplexes every connection through
//! a readiness-based event loop; there is no locking anywhere in the
//! data plane.
//!
//! The interesting parts live in three places:
//! - [`storage::hash`]: a chained hash table that grows by progressive
//!   rehashing, so no single operation pays for a full resize
//! - [`storage::avl`]: an order-statistic AVL tree (subtree counts give
//!   O(log n) rank and offset queries)
//! - [`storage::zset`]: ordered sets indexing the same nodes through
//!   both structures at once
//!
//! ## Example
//!
//! ```no_run
//! fn main() -> ordo::Result<()> {
//!     ordo::serve("0.0.0.0", 1234)
//! }
//! ```

#![warn(rust_2018_idioms, trivial_casts, unused_lifetimes, unused_qualifications)]
#![allow(clippy::module_name_repetitions)]

/// Command parsing and execution.
pub mod commands;
/// Error types and result alias.
pub mod error;
/// Request grammar and TLV response codec.
pub mod protocol;
/// TCP listener, event loop, and connection state machine.
pub mod server;
/// Hash table, order-statistic tree, ordered sets, keyspace.
pub mod storage;

pub use error::{Error, Result};
pub use protocol::Value;
pub use server::{serve, Config, Server};
pub use storage::{Dict, ZSet};

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server port.
pub const DEFAULT_PORT: u16 = 1234;

/// Largest request or response body (32 MiB). A request frame declaring
/// more is protocol-fatal; a response body growing past it is replaced
/// with an error value.
pub const MAX_MSG_SIZE: usize = 32 << 20;

/// Largest argument count a request may declare.
pub const MAX_ARGS: usize = 200_000;
