//! Ordered set: (score, name) pairs with rank and range queries.
//!
//! Every member is one [`ZNode`] in a slab, threaded through two indices
//! at once: an order-statistic AVL tree keyed lexicographically on
//! `(score, name)` for ordered queries, and a hash index keyed on `name`
//! alone for point lookups. The tree and the hash index always hold
//! exactly the same nodes.

use bytes::Bytes;

use super::avl::{self, AvlLink, AvlStore};
use super::hash::{fnv1a, HMap, HashLink, HashStore};
use super::NodeId;

/// One member of an ordered set.
#[derive(Debug)]
pub struct ZNode {
    name: Bytes,
    score: f64,
    hash: HashLink,
    tree: AvlLink,
}

impl ZNode {
    #[inline]
    pub fn name(&self) -> &Bytes {
        &self.name
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }
}

impl HashStore for slab::Slab<ZNode> {
    fn hash_link(&self, id: NodeId) -> &HashLink {
        &self[id].hash
    }
    fn hash_link_mut(&mut self, id: NodeId) -> &mut HashLink {
        &mut self[id].hash
    }
}

impl AvlStore for slab::Slab<ZNode> {
    fn avl_link(&self, id: NodeId) -> &AvlLink {
        &self[id].tree
    }
    fn avl_link_mut(&mut self, id: NodeId) -> &mut AvlLink {
        &mut self[id].tree
    }
}

/// `(a.score, a.name) < (b.score, b.name)`.
fn zless(a: &ZNode, b: &ZNode) -> bool {
    if a.score != b.score {
        return a.score < b.score;
    }
    a.name < b.name
}

/// `(node.score, node.name) < (score, name)`.
fn zless_key(node: &ZNode, score: f64, name: &[u8]) -> bool {
    if node.score != score {
        return node.score < score;
    }
    node.name.as_ref() < name
}

/// An ordered set.
#[derive(Debug, Default)]
pub struct ZSet {
    nodes: slab::Slab<ZNode>,
    root: Option<NodeId>,
    by_name: HMap,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &ZNode {
        &self.nodes[id]
    }

    /// Upsert a member. Returns `true` if the name was new, `false` if an
    /// existing member had its score moved.
    pub fn insert(&mut self, name: &[u8], score: f64) -> bool {
        if let Some(id) = self.lookup(name) {
            self.update_score(id, score);
            return false;
        }
        let id = self.nodes.insert(ZNode {
            name: Bytes::copy_from_slice(name),
            score,
            hash: HashLink::new(fnv1a(name)),
            tree: AvlLink::leaf(),
        });
        self.by_name.insert(&mut self.nodes, id);
        self.tree_insert(id);
        true
    }

    /// Point query through the hash index.
    pub fn lookup(&mut self, name: &[u8]) -> Option<NodeId> {
        self.by_name
            .lookup(&mut self.nodes, fnv1a(name), |s, id| {
                s[id].name.as_ref() == name
            })
    }

    /// Remove the member with `name`, if present.
    pub fn remove(&mut self, name: &[u8]) -> bool {
        match self.lookup(name) {
            Some(id) => {
                self.delete(id);
                true
            }
            None => false,
        }
    }

    /// Remove a known member from both indices and free it.
    pub fn delete(&mut self, id: NodeId) {
        let hcode = self.nodes[id].hash.hcode;
        let detached = self
            .by_name
            .remove(&mut self.nodes, hcode, |_, cand| cand == id);
        debug_assert_eq!(detached, Some(id));
        self.root = avl::detach(&mut self.nodes, id);
        self.nodes.remove(id);
    }

    /// Smallest member with `(score, name)` ≥ the probe, or `None`.
    pub fn seek_ge(&self, score: f64, name: &[u8]) -> Option<NodeId> {
        let mut found = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            if zless_key(node, score, name) {
                cur = node.tree.right();
            } else {
                found = Some(id);
                cur = node.tree.left();
            }
        }
        found
    }

    /// The member `k` positions away from `id` in score order.
    pub fn offset(&self, id: NodeId, k: i64) -> Option<NodeId> {
        avl::offset(&self.nodes, id, k)
    }

    /// 0-based rank of a member in score order.
    pub fn rank(&self, id: NodeId) -> i64 {
        avl::rank(&self.nodes, id)
    }

    fn tree_insert(&mut self, id: NodeId) {
        self.root = Some(avl::insert(&mut self.nodes, self.root, id, |s, a, b| {
            zless(&s[a], &s[b])
        }));
    }

    /// Move an existing member to a new score: detach from the tree,
    /// rewrite the score, reinsert under the new key. The hash index is
    /// untouched; the name did not change.
    fn update_score(&mut self, id: NodeId, score: f64) {
        self.root = avl::detach(&mut self.nodes, id);
        self.nodes[id].score = score;
        self.tree_insert(id);
    }
}
