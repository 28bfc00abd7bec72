//! Length-framed binary protocol.
//!
//! Requests are argument vectors (`request`), responses are single TLV
//! values (`value`). Both sit inside a little-endian u32 length frame;
//! the connection layer owns the framing, these modules own the bodies.

pub mod request;
pub mod value;

pub use value::{Value, TAG_ARR, TAG_DBL, TAG_ERR, TAG_INT, TAG_NIL, TAG_STR};
