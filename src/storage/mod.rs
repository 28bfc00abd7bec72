//! In-memory storage engine.
//!
//! The layout follows one rule throughout: slabs own the entities,
//! index structures coordinate stable slab indices through embedded
//! links. That keeps every entity a single allocation no matter how
//! many indices it participates in.

pub mod avl;
pub mod dict;
pub mod hash;
pub mod zset;

pub use dict::{Dict, Entry, Object};
pub use zset::{ZNode, ZSet};

/// Stable index of an entity inside its slab. Stands in for the pointer
/// an intrusive C structure would carry.
pub type NodeId = usize;
