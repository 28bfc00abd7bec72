//! Chained hash table with progressive rehashing.
//!
//! The table does not own its entries. Entries live in a slab owned by the
//! caller and carry an embedded [`HashLink`]; the table coordinates those
//! links through the [`HashStore`] trait. This is what lets one entity sit
//! in several indices (see `zset`) with a single allocation.

use super::NodeId;

/// Initial number of slots in a fresh table.
const INIT_CAP: usize = 4;

/// Resize once the primary table holds this many entries per slot.
const MAX_LOAD_FACTOR: usize = 8;

/// Upper bound on entries migrated per user-visible operation.
const REHASH_WORK: usize = 128;

/// FNV-1a over the key bytes. Computed once per key and cached in the link.
#[inline]
pub fn fnv1a(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut h = OFFSET;
    for &b in data {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME);
    }
    h
}

/// The hash-chain linkage embedded in each stored entity.
#[derive(Debug, Clone, Copy)]
pub struct HashLink {
    /// Precomputed hash of the entity's key. Stable for its lifetime.
    pub hcode: u64,
    next: Option<NodeId>,
}

impl HashLink {
    /// A detached link carrying a precomputed hash.
    #[inline]
    pub fn new(hcode: u64) -> Self {
        Self { hcode, next: None }
    }
}

/// Resolves a [`NodeId`] to the [`HashLink`] embedded in the entity.
///
/// Implemented by the slabs that own the entities. All operations on one
/// table must go through the same store.
pub trait HashStore {
    fn hash_link(&self, id: NodeId) -> &HashLink;
    fn hash_link_mut(&mut self, id: NodeId) -> &mut HashLink;
}

/// Address of the link that references a node: either a bucket head or the
/// `next` field of the predecessor. Detaching through a cursor is O(1), no
/// second chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Head(usize),
    Chain(NodeId),
}

/// A single bucket array. Capacity is always a power of two.
#[derive(Debug, Default)]
struct HTab {
    buckets: Vec<Option<NodeId>>,
    mask: usize,
    len: usize,
}

impl HTab {
    fn with_capacity(n: usize) -> Self {
        debug_assert!(n.is_power_of_two());
        Self {
            buckets: vec![None; n],
            mask: n - 1,
            len: 0,
        }
    }

    #[inline]
    fn slot(&self, hcode: u64) -> usize {
        (hcode as usize) & self.mask
    }

    /// Walk the chain for `hcode`, comparing the cached hash before the
    /// full key. Returns the cursor to the incoming link and the match.
    fn lookup<S: HashStore>(
        &self,
        store: &S,
        hcode: u64,
        eq: impl Fn(&S, NodeId) -> bool,
    ) -> Option<(Cursor, NodeId)> {
        let slot = self.slot(hcode);
        let mut cursor = Cursor::Head(slot);
        let mut next = self.buckets[slot];
        while let Some(id) = next {
            let link = store.hash_link(id);
            if link.hcode == hcode && eq(store, id) {
                return Some((cursor, id));
            }
            cursor = Cursor::Chain(id);
            next = link.next;
        }
        None
    }

    /// Prepend `id` to its chain.
    fn insert<S: HashStore>(&mut self, store: &mut S, id: NodeId) {
        let slot = self.slot(store.hash_link(id).hcode);
        store.hash_link_mut(id).next = self.buckets[slot];
        self.buckets[slot] = Some(id);
        self.len += 1;
    }

    /// Unlink `id`, redirecting the incoming link the cursor addresses.
    fn detach<S: HashStore>(&mut self, store: &mut S, cursor: Cursor, id: NodeId) {
        let next = store.hash_link(id).next;
        match cursor {
            Cursor::Head(slot) => self.buckets[slot] = next,
            Cursor::Chain(prev) => store.hash_link_mut(prev).next = next,
        }
        store.hash_link_mut(id).next = None;
        self.len -= 1;
    }

    fn for_each<S: HashStore>(&self, store: &S, f: &mut impl FnMut(NodeId)) {
        for head in &self.buckets {
            let mut next = *head;
            while let Some(id) = next {
                next = store.hash_link(id).next;
                f(id);
            }
        }
    }
}

/// A hash map that grows by migrating a bounded number of entries per
/// operation instead of rehashing in one pause.
///
/// `newer` receives all inserts. While a resize is in flight, `older`
/// holds the not-yet-migrated remainder and `migrate_pos` tracks the next
/// slot to drain; every lookup/insert/remove first moves up to
/// [`REHASH_WORK`] entries across. A key resides in exactly one table.
#[derive(Debug)]
pub struct HMap {
    newer: HTab,
    older: Option<HTab>,
    migrate_pos: usize,
}

impl Default for HMap {
    fn default() -> Self {
        Self::new()
    }
}

impl HMap {
    pub fn new() -> Self {
        Self {
            newer: HTab::with_capacity(INIT_CAP),
            older: None,
            migrate_pos: 0,
        }
    }

    /// Total number of entries across both tables.
    #[inline]
    pub fn len(&self) -> usize {
        self.newer.len + self.older.as_ref().map_or(0, |t| t.len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a resize is draining the old table.
    #[inline]
    pub fn is_migrating(&self) -> bool {
        self.older.is_some()
    }

    /// Find the node with `hcode` whose key satisfies `eq`, consulting the
    /// live table first, then the draining one.
    pub fn lookup<S: HashStore>(
        &mut self,
        store: &mut S,
        hcode: u64,
        eq: impl Fn(&S, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.help_rehash(store);
        if let Some((_, id)) = self.newer.lookup(store, hcode, &eq) {
            return Some(id);
        }
        let older = self.older.as_ref()?;
        let (_, id) = older.lookup(store, hcode, &eq)?;
        Some(id)
    }

    /// Insert a node that is known not to be present. Duplicate suppression
    /// is the caller's job (commands do a lookup first).
    pub fn insert<S: HashStore>(&mut self, store: &mut S, id: NodeId) {
        self.help_rehash(store);
        self.newer.insert(store, id);
        self.maybe_start_resize();
    }

    /// Detach and return the matching node, if any.
    pub fn remove<S: HashStore>(
        &mut self,
        store: &mut S,
        hcode: u64,
        eq: impl Fn(&S, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.help_rehash(store);
        if let Some((cursor, id)) = self.newer.lookup(store, hcode, &eq) {
            self.newer.detach(store, cursor, id);
            return Some(id);
        }
        let older = self.older.as_mut()?;
        let (cursor, id) = older.lookup(store, hcode, &eq)?;
        older.detach(store, cursor, id);
        Some(id)
    }

    /// Visit every entry: the live table's chains first, then whatever is
    /// still waiting in the draining table.
    pub fn for_each<S: HashStore>(&self, store: &S, mut f: impl FnMut(NodeId)) {
        self.newer.for_each(store, &mut f);
        if let Some(older) = &self.older {
            older.for_each(store, &mut f);
        }
    }

    fn maybe_start_resize(&mut self) {
        if self.older.is_some() {
            return;
        }
        let cap = self.newer.mask + 1;
        if self.newer.len >= cap * MAX_LOAD_FACTOR {
            let bigger = HTab::with_capacity(cap * 2);
            self.older = Some(std::mem::replace(&mut self.newer, bigger));
            self.migrate_pos = 0;
        }
    }

    /// Move up to [`REHASH_WORK`] entries from the draining table into the
    /// live one. Bounded, so no operation pays for the whole resize.
    fn help_rehash<S: HashStore>(&mut self, store: &mut S) {
        let Some(older) = self.older.as_mut() else {
            return;
        };
        let mut moved = 0;
        while moved < REHASH_WORK && older.len > 0 {
            let Some(id) = older.buckets[self.migrate_pos] else {
                self.migrate_pos += 1;
                continue;
            };
            older.detach(store, Cursor::Head(self.migrate_pos), id);
            self.newer.insert(store, id);
            moved += 1;
        }
        if older.len == 0 {
            self.older = None;
            self.migrate_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slab::Slab;

    struct Item {
        key: u64,
        link: HashLink,
    }

    impl HashStore for Slab<Item> {
        fn hash_link(&self, id: NodeId) -> &HashLink {
            &self[id].link
        }
        fn hash_link_mut(&mut self, id: NodeId) -> &mut HashLink {
            &mut self[id].link
        }
    }

    // Deliberately weak hash so chains actually form.
    fn weak_hash(key: u64) -> u64 {
        key % 7
    }

    fn insert_key(map: &mut HMap, slab: &mut Slab<Item>, key: u64) -> NodeId {
        let id = slab.insert(Item {
            key,
            link: HashLink::new(weak_hash(key)),
        });
        map.insert(slab, id);
        id
    }

    fn find_key(map: &mut HMap, slab: &mut Slab<Item>, key: u64) -> Option<NodeId> {
        map.lookup(slab, weak_hash(key), |s, id| s[id].key == key)
    }

    /// Every entry is reachable through exactly one table and the per-table
    /// counters match the enumerated chain totals.
    fn check_invariants(map: &HMap, slab: &Slab<Item>) {
        let mut seen = std::collections::HashSet::new();
        let mut enumerate = |tab: &HTab| {
            let mut total = 0;
            for (slot, head) in tab.buckets.iter().enumerate() {
                let mut next = *head;
                while let Some(id) = next {
                    let link = slab.hash_link(id);
                    assert_eq!((link.hcode as usize) & tab.mask, slot);
                    assert!(seen.insert(id), "node {id} linked twice");
                    total += 1;
                    next = link.next;
                }
            }
            assert_eq!(total, tab.len);
        };
        enumerate(&map.newer);
        if let Some(older) = &map.older {
            enumerate(older);
        }
        assert_eq!(seen.len(), map.len());
    }

    #[test]
    fn fnv1a_known_vectors() {
        // Offset basis for the empty input, published vector for "a".
        assert_eq!(fnv1a(b""), 0xCBF2_9CE4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xAF63_DC4C_8601_EC8C);
    }

    #[test]
    fn insert_lookup_remove() {
        let mut slab = Slab::new();
        let mut map = HMap::new();
        let id = insert_key(&mut map, &mut slab, 42);
        assert_eq!(find_key(&mut map, &mut slab, 42), Some(id));
        assert_eq!(find_key(&mut map, &mut slab, 43), None);

        let removed = map.remove(&mut slab, weak_hash(42), |s, id| s[id].key == 42);
        assert_eq!(removed, Some(id));
        assert_eq!(map.len(), 0);
        assert_eq!(find_key(&mut map, &mut slab, 42), None);
    }

    #[test]
    fn collision_chains_preserve_all_keys() {
        let mut slab = Slab::new();
        let mut map = HMap::new();
        // All multiples of 7 share hcode 0.
        for key in (0..20).map(|i| i * 7) {
            insert_key(&mut map, &mut slab, key);
        }
        check_invariants(&map, &slab);
        for key in (0..20).map(|i| i * 7) {
            assert!(find_key(&mut map, &mut slab, key).is_some());
        }
        // Detach from the middle of a chain.
        map.remove(&mut slab, 0, |s, id| s[id].key == 70);
        check_invariants(&map, &slab);
        assert!(find_key(&mut map, &mut slab, 70).is_none());
        assert!(find_key(&mut map, &mut slab, 63).is_some());
        assert!(find_key(&mut map, &mut slab, 77).is_some());
    }

    #[test]
    fn every_key_reachable_during_migration() {
        let mut slab = Slab::new();
        let mut map = HMap::new();
        let mut present = Vec::new();
        // Push far past several resize thresholds, probing older keys after
        // each insert so lookups interleave with in-flight migrations.
        for key in 0..4096u64 {
            let id = slab.insert(Item {
                key,
                link: HashLink::new(key), // identity hash spreads the slots
            });
            map.insert(&mut slab, id);
            present.push(key);
            let probe = present[(key as usize * 31) % present.len()];
            let found = map.lookup(&mut slab, probe, |s, id| s[id].key == probe);
            assert!(found.is_some(), "key {probe} lost during migration");
        }
        while map.is_migrating() {
            map.lookup(&mut slab, 0, |s, id| s[id].key == 0);
        }
        check_invariants(&map, &slab);
        assert_eq!(map.len(), 4096);
        for key in 0..4096u64 {
            assert!(map.lookup(&mut slab, key, |s, id| s[id].key == key).is_some());
        }
    }

    #[test]
    fn iteration_visits_each_entry_once() {
        let mut slab = Slab::new();
        let mut map = HMap::new();
        for key in 0..100u64 {
            let id = slab.insert(Item {
                key,
                link: HashLink::new(key),
            });
            map.insert(&mut slab, id);
        }
        let mut keys = Vec::new();
        map.for_each(&slab, |id| keys.push(slab[id].key));
        keys.sort_unstable();
        assert_eq!(keys, (0..100u64).collect::<Vec<_>>());
    }
}
