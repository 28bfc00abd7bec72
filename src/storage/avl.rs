//! Order-statistic AVL tree.
//!
//! Like the hash table, the tree owns no nodes: entities carry an embedded
//! [`AvlLink`] inside a caller-owned slab and the routines here coordinate
//! those links through [`AvlStore`]. Each link tracks its subtree height
//! and cardinality, which is what makes `rank` and `offset` O(log n).
//!
//! Mutating routines return the (possibly new) subtree root; the caller
//! keeps the root id. Invariants maintained across every call: the AVL
//! balance property, correct `height` and `count`, bidirectional parent
//! links, and strictly increasing in-order sequence under the caller's
//! comparator.

use super::NodeId;

/// Tree linkage and order-statistic augmentation embedded in each entity.
#[derive(Debug, Clone, Copy)]
pub struct AvlLink {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    height: u32,
    count: u32,
}

impl AvlLink {
    /// A detached single-node subtree.
    #[inline]
    pub fn leaf() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            height: 1,
            count: 1,
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    #[inline]
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Default for AvlLink {
    fn default() -> Self {
        Self::leaf()
    }
}

/// Resolves a [`NodeId`] to the [`AvlLink`] embedded in the entity.
pub trait AvlStore {
    fn avl_link(&self, id: NodeId) -> &AvlLink;
    fn avl_link_mut(&mut self, id: NodeId) -> &mut AvlLink;
}

/// Height of an optional subtree; the absent side counts as 0.
#[inline]
fn height<S: AvlStore>(store: &S, node: Option<NodeId>) -> u32 {
    node.map_or(0, |id| store.avl_link(id).height)
}

/// Cardinality of an optional subtree.
#[inline]
fn count<S: AvlStore>(store: &S, node: Option<NodeId>) -> u32 {
    node.map_or(0, |id| store.avl_link(id).count)
}

/// Recompute `height` and `count` from the children.
fn update<S: AvlStore>(store: &mut S, id: NodeId) {
    let link = store.avl_link(id);
    let h = 1 + height(store, link.left).max(height(store, link.right));
    let c = 1 + count(store, link.left) + count(store, link.right);
    let link = store.avl_link_mut(id);
    link.height = h;
    link.count = c;
}

/// Rotate left around `x`; returns the new subtree root. The caller
/// re-links the parent's child edge.
fn rotate_left<S: AvlStore>(store: &mut S, x: NodeId) -> NodeId {
    let parent = store.avl_link(x).parent;
    let Some(y) = store.avl_link(x).right else {
        return x;
    };
    let middle = store.avl_link(y).left;

    store.avl_link_mut(y).left = Some(x);
    store.avl_link_mut(x).parent = Some(y);
    store.avl_link_mut(x).right = middle;
    if let Some(m) = middle {
        store.avl_link_mut(m).parent = Some(x);
    }
    store.avl_link_mut(y).parent = parent;

    update(store, x);
    update(store, y);
    y
}

fn rotate_right<S: AvlStore>(store: &mut S, y: NodeId) -> NodeId {
    let parent = store.avl_link(y).parent;
    let Some(x) = store.avl_link(y).left else {
        return y;
    };
    let middle = store.avl_link(x).right;

    store.avl_link_mut(x).right = Some(y);
    store.avl_link_mut(y).parent = Some(x);
    store.avl_link_mut(y).left = middle;
    if let Some(m) = middle {
        store.avl_link_mut(m).parent = Some(y);
    }
    store.avl_link_mut(x).parent = parent;

    update(store, y);
    update(store, x);
    x
}

/// The left side is 2 taller. If the imbalance sits in left-right, rotate
/// it into left-left first, then rotate right.
fn fix_left<S: AvlStore>(store: &mut S, node: NodeId) -> NodeId {
    let Some(left) = store.avl_link(node).left else {
        return node;
    };
    if height(store, store.avl_link(left).left) < height(store, store.avl_link(left).right) {
        let new_left = rotate_left(store, left);
        store.avl_link_mut(node).left = Some(new_left);
        store.avl_link_mut(new_left).parent = Some(node);
    }
    rotate_right(store, node)
}

fn fix_right<S: AvlStore>(store: &mut S, node: NodeId) -> NodeId {
    let Some(right) = store.avl_link(node).right else {
        return node;
    };
    if height(store, store.avl_link(right).right) < height(store, store.avl_link(right).left) {
        let new_right = rotate_right(store, right);
        store.avl_link_mut(node).right = Some(new_right);
        store.avl_link_mut(new_right).parent = Some(node);
    }
    rotate_left(store, node)
}

/// Walk from a just-modified node to the root, refreshing the
/// augmentation and rebalancing wherever one side got 2 taller.
/// Returns the tree's (possibly new) root.
pub fn fix<S: AvlStore>(store: &mut S, start: NodeId) -> NodeId {
    let mut node = start;
    loop {
        update(store, node);
        let parent = store.avl_link(node).parent;
        let hl = height(store, store.avl_link(node).left);
        let hr = height(store, store.avl_link(node).right);
        let mut subtree = node;
        if hl == hr + 2 {
            subtree = fix_left(store, node);
        } else if hr == hl + 2 {
            subtree = fix_right(store, node);
        }
        let Some(p) = parent else {
            return subtree;
        };
        if subtree != node {
            // The rotation set subtree.parent already; redirect the edge.
            if store.avl_link(p).left == Some(node) {
                store.avl_link_mut(p).left = Some(subtree);
            } else {
                store.avl_link_mut(p).right = Some(subtree);
            }
        }
        node = p;
    }
}

/// Descend from `root` by the comparator, attach `node` as a leaf, and
/// rebalance. Returns the new root. Equal keys go right, so the insert
/// order is preserved among duplicates.
pub fn insert<S: AvlStore>(
    store: &mut S,
    root: Option<NodeId>,
    node: NodeId,
    less: impl Fn(&S, NodeId, NodeId) -> bool,
) -> NodeId {
    *store.avl_link_mut(node) = AvlLink::leaf();
    let Some(mut cur) = root else {
        return node;
    };
    loop {
        let go_left = less(store, node, cur);
        let next = if go_left {
            store.avl_link(cur).left
        } else {
            store.avl_link(cur).right
        };
        match next {
            Some(n) => cur = n,
            None => {
                if go_left {
                    store.avl_link_mut(cur).left = Some(node);
                } else {
                    store.avl_link_mut(cur).right = Some(node);
                }
                store.avl_link_mut(node).parent = Some(cur);
                return fix(store, node);
            }
        }
    }
}

/// Splice out a node with at most one child and rebalance from its parent.
fn detach_simple<S: AvlStore>(store: &mut S, node: NodeId) -> Option<NodeId> {
    let link = *store.avl_link(node);
    debug_assert!(link.left.is_none() || link.right.is_none());
    let child = link.left.or(link.right);
    if let Some(c) = child {
        store.avl_link_mut(c).parent = link.parent;
    }
    let Some(parent) = link.parent else {
        return child;
    };
    if store.avl_link(parent).left == Some(node) {
        store.avl_link_mut(parent).left = child;
    } else {
        store.avl_link_mut(parent).right = child;
    }
    Some(fix(store, parent))
}

/// Remove `node` from its tree and return the new root. The node's link
/// is left detached; the entity itself is untouched.
pub fn detach<S: AvlStore>(store: &mut S, node: NodeId) -> Option<NodeId> {
    let (Some(_), Some(right)) = (store.avl_link(node).left, store.avl_link(node).right) else {
        return detach_simple(store, node);
    };

    // Two children: splice out the in-order successor (leftmost of the
    // right subtree) via the simple case, then move it into the victim's
    // position, adopting its children and parent.
    let mut succ = right;
    while let Some(l) = store.avl_link(succ).left {
        succ = l;
    }
    detach_simple(store, succ);

    // Re-read the victim's links: the splice above may have changed them.
    let link = *store.avl_link(node);
    *store.avl_link_mut(succ) = link;
    if let Some(l) = link.left {
        store.avl_link_mut(l).parent = Some(succ);
    }
    if let Some(r) = link.right {
        store.avl_link_mut(r).parent = Some(succ);
    }
    if let Some(p) = link.parent {
        if store.avl_link(p).left == Some(node) {
            store.avl_link_mut(p).left = Some(succ);
        } else {
            store.avl_link_mut(p).right = Some(succ);
        }
    }
    update(store, succ);
    Some(fix(store, succ))
}

/// 0-based position of `node` in sorted order: everything in its left
/// subtree, plus the left flanks crossed on the way up.
pub fn rank<S: AvlStore>(store: &S, node: NodeId) -> i64 {
    let mut r = i64::from(count(store, store.avl_link(node).left));
    let mut cur = node;
    while let Some(p) = store.avl_link(cur).parent {
        if store.avl_link(p).right == Some(cur) {
            r += i64::from(count(store, store.avl_link(p).left)) + 1;
        }
        cur = p;
    }
    r
}

/// The node `k` positions away from `node` in sorted order (`k` may be
/// negative), or `None` if that position is out of range. Walks the tree
/// keeping the running rank difference `pos`; terminates when `pos == k`.
pub fn offset<S: AvlStore>(store: &S, node: NodeId, k: i64) -> Option<NodeId> {
    let mut pos: i64 = 0;
    let mut cur = node;
    while pos != k {
        let link = store.avl_link(cur);
        if pos < k && pos + i64::from(count(store, link.right)) >= k {
            // Target is inside the right subtree.
            cur = link.right?;
            pos += i64::from(count(store, store.avl_link(cur).left)) + 1;
        } else if pos > k && pos - i64::from(count(store, link.left)) <= k {
            // Target is inside the left subtree.
            cur = link.left?;
            pos -= i64::from(count(store, store.avl_link(cur).right)) + 1;
        } else {
            // Neither subtree covers the target; ascend, adjusting by the
            // contribution of the edge crossed.
            let p = link.parent?;
            if store.avl_link(p).right == Some(cur) {
                pos -= i64::from(count(store, link.left)) + 1;
            } else {
                pos += i64::from(count(store, link.right)) + 1;
            }
            cur = p;
        }
    }
    Some(cur)
}

/// Leftmost node of the subtree at `root`.
pub fn leftmost<S: AvlStore>(store: &S, root: NodeId) -> NodeId {
    let mut cur = root;
    while let Some(l) = store.avl_link(cur).left {
        cur = l;
    }
    cur
}

/// In-order successor, or `None` at the maximum.
pub fn successor<S: AvlStore>(store: &S, node: NodeId) -> Option<NodeId> {
    if let Some(r) = store.avl_link(node).right {
        return Some(leftmost(store, r));
    }
    let mut cur = node;
    let mut parent = store.avl_link(cur).parent;
    while let Some(p) = parent {
        if store.avl_link(p).right != Some(cur) {
            return Some(p);
        }
        cur = p;
        parent = store.avl_link(cur).parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use slab::Slab;

    struct Item {
        key: u32,
        link: AvlLink,
    }

    impl AvlStore for Slab<Item> {
        fn avl_link(&self, id: NodeId) -> &AvlLink {
            &self[id].link
        }
        fn avl_link_mut(&mut self, id: NodeId) -> &mut AvlLink {
            &mut self[id].link
        }
    }

    fn by_key(s: &Slab<Item>, a: NodeId, b: NodeId) -> bool {
        s[a].key < s[b].key
    }

    fn insert_key(slab: &mut Slab<Item>, root: Option<NodeId>, key: u32) -> NodeId {
        let id = slab.insert(Item {
            key,
            link: AvlLink::leaf(),
        });
        insert(slab, root, id, by_key)
    }

    /// Recursively verify the balance, height, count, parent-link, and
    /// ordering invariants; returns the subtree's in-order keys.
    fn verify(slab: &Slab<Item>, node: Option<NodeId>, parent: Option<NodeId>) -> Vec<u32> {
        let Some(id) = node else {
            return Vec::new();
        };
        let link = slab.avl_link(id);
        assert_eq!(link.parent, parent, "parent link broken at {id}");

        let left = verify(slab, link.left, Some(id));
        let right = verify(slab, link.right, Some(id));

        let hl = height(slab, link.left);
        let hr = height(slab, link.right);
        assert!(hl.abs_diff(hr) <= 1, "imbalance at key {}", slab[id].key);
        assert_eq!(link.height, 1 + hl.max(hr));
        assert_eq!(link.count as usize, 1 + left.len() + right.len());

        if let Some(&max_left) = left.last() {
            assert!(max_left <= slab[id].key);
        }
        if let Some(&min_right) = right.first() {
            assert!(slab[id].key <= min_right);
        }

        let mut keys = left;
        keys.push(slab[id].key);
        keys.extend(right);
        keys
    }

    #[test]
    fn sequential_insert_stays_balanced() {
        let mut slab = Slab::new();
        let mut root = None;
        for key in 0..1000 {
            root = Some(insert_key(&mut slab, root, key));
        }
        let keys = verify(&slab, root, None);
        assert_eq!(keys, (0..1000).collect::<Vec<_>>());
        // A thousand sequential keys must not degenerate into a list.
        assert!(slab.avl_link(root.unwrap()).height <= 11);
    }

    /// Allocation-free variant of [`verify`] for the large randomized run:
    /// checks balance, augmentation, parent links, and the key window, and
    /// returns (height, count).
    fn check(
        slab: &Slab<Item>,
        node: Option<NodeId>,
        parent: Option<NodeId>,
        lo: Option<u32>,
        hi: Option<u32>,
    ) -> (u32, u32) {
        let Some(id) = node else {
            return (0, 0);
        };
        let link = slab.avl_link(id);
        let key = slab[id].key;
        assert_eq!(link.parent, parent);
        if let Some(lo) = lo {
            assert!(lo <= key);
        }
        if let Some(hi) = hi {
            assert!(key <= hi);
        }
        let (hl, cl) = check(slab, link.left, Some(id), lo, Some(key));
        let (hr, cr) = check(slab, link.right, Some(id), Some(key), hi);
        assert!(hl.abs_diff(hr) <= 1);
        assert_eq!(link.height, 1 + hl.max(hr));
        assert_eq!(link.count, 1 + cl + cr);
        (link.height, link.count)
    }

    #[test]
    fn randomized_inserts_and_deletes_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut slab: Slab<Item> = Slab::new();
        let mut root: Option<NodeId> = None;
        let mut live: Vec<NodeId> = Vec::new();
        let (mut inserts, mut deletes) = (0, 0);

        while inserts < 10_000 || deletes < 5_000 {
            let insert_turn =
                inserts < 10_000 && (live.is_empty() || deletes >= 5_000 || rng.gen_range(0..3) > 0);
            if insert_turn {
                let id = slab.insert(Item {
                    key: rng.gen_range(0..100_000),
                    link: AvlLink::leaf(),
                });
                root = Some(insert(&mut slab, root, id, by_key));
                live.push(id);
                inserts += 1;
            } else {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                root = detach(&mut slab, victim);
                slab.remove(victim);
                deletes += 1;
            }
            let (_, count) = check(&slab, root, None, None, None);
            assert_eq!(count as usize, live.len());
        }
        assert_eq!(live.len(), 5_000);
    }

    #[test]
    fn rank_matches_inorder_position() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut slab = Slab::new();
        let mut root = None;
        for _ in 0..500 {
            root = Some(insert_key(&mut slab, root, rng.gen_range(0..10_000)));
        }
        let mut expect = 0;
        let mut cur = root.map(|r| leftmost(&slab, r));
        while let Some(id) = cur {
            assert_eq!(rank(&slab, id), expect);
            expect += 1;
            cur = successor(&slab, id);
        }
        assert_eq!(expect, 500);
    }

    #[test]
    fn offset_reaches_every_pair() {
        let mut slab = Slab::new();
        let mut root = None;
        for key in 0..300 {
            root = Some(insert_key(&mut slab, root, key * 2));
        }
        let mut inorder = Vec::new();
        let mut cur = root.map(|r| leftmost(&slab, r));
        while let Some(id) = cur {
            inorder.push(id);
            cur = successor(&slab, id);
        }
        for i in 0..inorder.len() {
            for j in 0..inorder.len() {
                let k = j as i64 - i as i64;
                assert_eq!(offset(&slab, inorder[i], k), Some(inorder[j]));
            }
            assert_eq!(offset(&slab, inorder[i], -(i as i64) - 1), None);
            assert_eq!(offset(&slab, inorder[i], inorder.len() as i64 - i as i64), None);
        }
    }

    #[test]
    fn detach_two_children_promotes_successor() {
        let mut slab = Slab::new();
        let mut root = None;
        for key in [50, 30, 70, 20, 40, 60, 80] {
            root = Some(insert_key(&mut slab, root, key));
        }
        // 50 sits at the root with two children; 60 must take its place.
        let fifty = (0..slab.len()).find(|&i| slab[i].key == 50).unwrap();
        root = detach(&mut slab, fifty);
        slab.remove(fifty);
        let keys = verify(&slab, root, None);
        assert_eq!(keys, vec![20, 30, 40, 60, 70, 80]);
    }
}
