/*
Red-black search tree keyed by any totally ordered type, used as the index
over D1 block upper bounds. Nodes live in an arena and point at each other
through handles, so parent back-references are plain indices.

Supported operations are insert (overwriting an existing key), remove
(no-op on an absent key), exact/upper/lower find, and min/max retrieval,
all O(log n).
*/

use std::cmp::Ordering;
use std::mem;

use crate::arena::{Arena, Handle};

/// Lookup mode for [`RbTree::find`].
///
/// `Upper` returns the node with the smallest key >= the probe (successor or
/// self); `Lower` the node with the largest key <= the probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindMode {
    Exact,
    Upper,
    Lower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    val: V,
    parent: Option<Handle>,
    left: Option<Handle>,
    right: Option<Handle>,
    color: Color,
}

#[derive(Debug)]
pub struct RbTree<K, V> {
    arena: Arena<Node<K, V>>,
    root: Option<Handle>,
    len: usize,
}

impl<K, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RbTree<K, V> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn node(&self, h: Handle) -> &Node<K, V> {
        self.arena.get(h)
    }

    #[inline]
    fn node_mut(&mut self, h: Handle) -> &mut Node<K, V> {
        self.arena.get_mut(h)
    }

    fn is_red(&self, h: Option<Handle>) -> bool {
        h.is_some_and(|h| self.node(h).color == Color::Red)
    }

    fn set_color(&mut self, h: Handle, color: Color) {
        self.node_mut(h).color = color;
    }

    fn subtree_min(&self, mut h: Handle) -> Handle {
        while let Some(left) = self.node(h).left {
            h = left;
        }
        h
    }

    fn subtree_max(&self, mut h: Handle) -> Handle {
        while let Some(right) = self.node(h).right {
            h = right;
        }
        h
    }

    /// Minimum entry of the tree.
    pub fn get_min(&self) -> Option<(&K, &V)> {
        let h = self.subtree_min(self.root?);
        let node = self.node(h);
        Some((&node.key, &node.val))
    }

    /// Maximum entry of the tree.
    pub fn get_max(&self) -> Option<(&K, &V)> {
        let h = self.subtree_max(self.root?);
        let node = self.node(h);
        Some((&node.key, &node.val))
    }

    fn rotate_left(&mut self, x: Handle) {
        let y = self.node(x).right.expect("rotate_left without a right child");
        let t2 = self.node(y).left;
        self.node_mut(x).right = t2;
        if let Some(t2) = t2 {
            self.node_mut(t2).parent = Some(x);
        }
        let p = self.node(x).parent;
        self.node_mut(y).parent = p;
        match p {
            None => self.root = Some(y),
            Some(p) => {
                if self.node(p).left == Some(x) {
                    self.node_mut(p).left = Some(y);
                } else {
                    self.node_mut(p).right = Some(y);
                }
            }
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    fn rotate_right(&mut self, y: Handle) {
        let x = self.node(y).left.expect("rotate_right without a left child");
        let t2 = self.node(x).right;
        self.node_mut(y).left = t2;
        if let Some(t2) = t2 {
            self.node_mut(t2).parent = Some(y);
        }
        let p = self.node(y).parent;
        self.node_mut(x).parent = p;
        match p {
            None => self.root = Some(x),
            Some(p) => {
                if self.node(p).left == Some(y) {
                    self.node_mut(p).left = Some(x);
                } else {
                    self.node_mut(p).right = Some(x);
                }
            }
        }
        self.node_mut(x).right = Some(y);
        self.node_mut(y).parent = Some(x);
    }

    fn swap_colors(&mut self, a: Handle, b: Handle) {
        let ca = self.node(a).color;
        let cb = self.node(b).color;
        self.set_color(a, cb);
        self.set_color(b, ca);
    }

    // node-parent-grandparent rebalancing patterns, mirrored for symmetry
    fn rebalance_ll(&mut self, gparent: Handle, parent: Handle) -> Handle {
        self.rotate_right(gparent);
        self.swap_colors(gparent, parent);
        parent
    }

    fn rebalance_rr(&mut self, gparent: Handle, parent: Handle) -> Handle {
        self.rotate_left(gparent);
        self.swap_colors(gparent, parent);
        parent
    }

    fn rebalance_lr(&mut self, gparent: Handle, parent: Handle) -> Handle {
        let node = self.node(parent).right.expect("lr pattern without inner child");
        self.rotate_left(parent);
        self.rebalance_ll(gparent, node)
    }

    fn rebalance_rl(&mut self, gparent: Handle, parent: Handle) -> Handle {
        let node = self.node(parent).left.expect("rl pattern without inner child");
        self.rotate_right(parent);
        self.rebalance_rr(gparent, node)
    }

    fn rebalance(&mut self, mut node: Handle) {
        loop {
            let Some(parent) = self.node(node).parent else { return };
            if !self.is_red(Some(node)) || !self.is_red(Some(parent)) {
                return;
            }
            let Some(gparent) = self.node(parent).parent else { return };

            let parent_is_left = self.node(gparent).left == Some(parent);
            let uncle = if parent_is_left {
                self.node(gparent).right
            } else {
                self.node(gparent).left
            };

            if self.is_red(uncle) {
                // Red uncle: push blackness down from the grandparent and
                // continue toward the root.
                self.set_color(uncle.expect("red uncle"), Color::Black);
                self.set_color(parent, Color::Black);
                let gp_color = if Some(gparent) == self.root {
                    Color::Black
                } else {
                    Color::Red
                };
                self.set_color(gparent, gp_color);
                node = gparent;
            } else {
                let node_is_left = self.node(parent).left == Some(node);
                node = match (parent_is_left, node_is_left) {
                    (true, true) => self.rebalance_ll(gparent, parent),
                    (true, false) => self.rebalance_lr(gparent, parent),
                    (false, true) => self.rebalance_rl(gparent, parent),
                    (false, false) => self.rebalance_rr(gparent, parent),
                };
            }
        }
    }

    fn find_handle(&self, key: &K) -> Option<Handle>
    where
        K: Ord,
    {
        let mut cur = self.root?;
        loop {
            match key.cmp(&self.node(cur).key) {
                Ordering::Less => cur = self.node(cur).left?,
                Ordering::Greater => cur = self.node(cur).right?,
                Ordering::Equal => return Some(cur),
            }
        }
    }

    /// Descends to the closest node: the match if the key exists, otherwise
    /// the leaf where the key would be attached.
    fn find_fuzzy(&self, key: &K) -> Option<Handle>
    where
        K: Ord,
    {
        let mut cur = self.root?;
        loop {
            match key.cmp(&self.node(cur).key) {
                Ordering::Less => match self.node(cur).left {
                    Some(left) => cur = left,
                    None => return Some(cur),
                },
                Ordering::Greater => match self.node(cur).right {
                    Some(right) => cur = right,
                    None => return Some(cur),
                },
                Ordering::Equal => return Some(cur),
            }
        }
    }

    pub fn find(&self, key: &K, mode: FindMode) -> Option<(&K, &V)>
    where
        K: Ord,
    {
        let start = self.find_fuzzy(key)?;
        let found = match mode {
            FindMode::Exact => (self.node(start).key == *key).then_some(start),
            FindMode::Upper => {
                // Walk up until a key >= the probe appears.
                let mut cur = Some(start);
                loop {
                    let h = cur?;
                    if self.node(h).key >= *key {
                        break Some(h);
                    }
                    cur = self.node(h).parent;
                }
            }
            FindMode::Lower => {
                let mut cur = Some(start);
                loop {
                    let h = cur?;
                    if self.node(h).key <= *key {
                        break Some(h);
                    }
                    cur = self.node(h).parent;
                }
            }
        }?;
        let node = self.node(found);
        Some((&node.key, &node.val))
    }

    pub fn get(&self, key: &K) -> Option<&V>
    where
        K: Ord,
    {
        self.find(key, FindMode::Exact).map(|(_, v)| v)
    }

    /// Inserts a key-value pair. An existing key has its value overwritten
    /// in place, with no structural change.
    pub fn insert(&mut self, key: K, val: V)
    where
        K: Ord,
    {
        let Some(root) = self.root else {
            let h = self.arena.alloc(Node {
                key,
                val,
                parent: None,
                left: None,
                right: None,
                color: Color::Black,
            });
            self.root = Some(h);
            self.len = 1;
            return;
        };

        let mut cur = root;
        loop {
            match key.cmp(&self.node(cur).key) {
                Ordering::Less => match self.node(cur).left {
                    Some(left) => cur = left,
                    None => {
                        let h = self.alloc_red(key, val, cur);
                        self.node_mut(cur).left = Some(h);
                        self.rebalance(h);
                        return;
                    }
                },
                Ordering::Greater => match self.node(cur).right {
                    Some(right) => cur = right,
                    None => {
                        let h = self.alloc_red(key, val, cur);
                        self.node_mut(cur).right = Some(h);
                        self.rebalance(h);
                        return;
                    }
                },
                Ordering::Equal => {
                    self.node_mut(cur).val = val;
                    return;
                }
            }
        }
    }

    fn alloc_red(&mut self, key: K, val: V, parent: Handle) -> Handle {
        self.len += 1;
        self.arena.alloc(Node {
            key,
            val,
            parent: Some(parent),
            left: None,
            right: None,
            color: Color::Red,
        })
    }

    /// Removes a key. Absent keys are a no-op.
    pub fn remove(&mut self, key: &K)
    where
        K: Ord,
    {
        let Some(mut node) = self.find_handle(key) else { return };

        // Push the doomed key/value down to a leaf by repeatedly swapping
        // with the in-order predecessor (or successor when there is no left
        // subtree).
        loop {
            let leaf = if let Some(left) = self.node(node).left {
                self.subtree_max(left)
            } else if let Some(right) = self.node(node).right {
                self.subtree_min(right)
            } else {
                break;
            };
            let (a, b) = self.arena.get2_mut(node, leaf);
            mem::swap(&mut a.key, &mut b.key);
            mem::swap(&mut a.val, &mut b.val);
            node = leaf;
        }

        self.remove_fixup(node);

        if Some(node) == self.root {
            self.root = None;
        } else {
            let parent = self.node(node).parent.expect("non-root without a parent");
            if self.node(parent).left == Some(node) {
                self.node_mut(parent).left = None;
            } else {
                self.node_mut(parent).right = None;
            }
        }
        self.arena.free(node);
        self.len -= 1;
    }

    /// Repairs the black-height deficit left by removing `node`, via the
    /// four mirrored fixup cases keyed on sibling/nephew/niece colors.
    fn remove_fixup(&mut self, mut node: Handle) {
        loop {
            if Some(node) == self.root {
                return;
            }
            if self.is_red(Some(node)) {
                self.set_color(node, Color::Black);
                return;
            }

            let parent = self.node(node).parent.expect("non-root without a parent");
            let node_is_left = self.node(parent).left == Some(node);
            let sibling = if node_is_left {
                self.node(parent).right
            } else {
                self.node(parent).left
            }
            .expect("black-height deficit node without a sibling");
            // niece = inner child of the sibling, nephew = outer child
            let (niece, nephew) = if node_is_left {
                (self.node(sibling).left, self.node(sibling).right)
            } else {
                (self.node(sibling).right, self.node(sibling).left)
            };

            if self.is_red(Some(sibling)) {
                // Rotate a black sibling into place, then retry.
                self.set_color(sibling, Color::Black);
                self.set_color(parent, Color::Red);
                if node_is_left {
                    self.rotate_left(parent);
                } else {
                    self.rotate_right(parent);
                }
            } else if self.is_red(nephew) {
                // Red outer nephew: terminal rotate-and-recolor.
                let parent_color = self.node(parent).color;
                self.set_color(sibling, parent_color);
                self.set_color(parent, Color::Black);
                self.set_color(nephew.expect("red nephew"), Color::Black);
                if node_is_left {
                    self.rotate_left(parent);
                } else {
                    self.rotate_right(parent);
                }
                return;
            } else if self.is_red(niece) {
                // Red inner niece: rotate it outward, then retry.
                self.set_color(sibling, Color::Red);
                self.set_color(niece.expect("red niece"), Color::Black);
                if node_is_left {
                    self.rotate_right(sibling);
                } else {
                    self.rotate_left(sibling);
                }
            } else {
                // All-black surroundings: recolor and push the deficit up.
                self.set_color(sibling, Color::Red);
                node = parent;
            }
        }
    }
}
