//! The primary keyspace: key → object, backed by the progressive-rehash
//! hash map.

use bytes::Bytes;

use super::hash::{fnv1a, HMap, HashLink, HashStore};
use super::zset::ZSet;
use super::NodeId;

/// What a key can hold.
#[derive(Debug)]
pub enum Object {
    Str(Bytes),
    Zset(Box<ZSet>),
}

/// One stored key. Owned by the dict's slab; chained through the
/// embedded link.
#[derive(Debug)]
pub struct Entry {
    key: Bytes,
    val: Object,
    link: HashLink,
}

impl Entry {
    #[inline]
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Object {
        &self.val
    }
}

impl HashStore for slab::Slab<Entry> {
    fn hash_link(&self, id: NodeId) -> &HashLink {
        &self[id].link
    }
    fn hash_link_mut(&mut self, id: NodeId) -> &mut HashLink {
        &mut self[id].link
    }
}

/// The top-level key space.
#[derive(Debug, Default)]
pub struct Dict {
    entries: slab::Slab<Entry>,
    map: HMap,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn find(&mut self, key: &[u8]) -> Option<NodeId> {
        self.map
            .lookup(&mut self.entries, fnv1a(key), |s, id| {
                s[id].key.as_ref() == key
            })
    }

    #[inline]
    pub fn value(&self, id: NodeId) -> &Object {
        &self.entries[id].val
    }

    #[inline]
    pub fn value_mut(&mut self, id: NodeId) -> &mut Object {
        &mut self.entries[id].val
    }

    /// Insert a key known to be absent (commands look up first).
    pub fn insert(&mut self, key: Bytes, val: Object) -> NodeId {
        let id = self.entries.insert(Entry {
            link: HashLink::new(fnv1a(&key)),
            key,
            val,
        });
        self.map.insert(&mut self.entries, id);
        id
    }

    /// Detach and drop the entry for `key`. Returns whether it existed.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let detached = self
            .map
            .remove(&mut self.entries, fnv1a(key), |s, id| {
                s[id].key.as_ref() == key
            });
        match detached {
            Some(id) => {
                self.entries.remove(id);
                true
            }
            None => false,
        }
    }

    /// Visit every key, live table first, then the draining one.
    pub fn for_each_key(&self, mut f: impl FnMut(&Bytes)) {
        self.map
            .for_each(&self.entries, |id| f(&self.entries[id].key));
    }
}
