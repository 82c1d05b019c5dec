//! Scapegoat tree (C11): an α-weight-balanced BST rebuilt via the
//! Stout–Warren tree-to-vine-to-tree flattening, grounded on `scapegoat.c`.
//!
//! Nodes live in a flat arena addressed by index, following the same
//! design used by [`crate::pqueue`] and [`crate::suffix`] for graphs that a
//! borrow-checked pointer/`Rc` representation would make awkward.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::container::Header;
use crate::error::{Error, Result};
use crate::observer::{self, subject_id, Event};
use crate::serialize::{self, FrameHeader, Stream, SCAPEGOAT_TAG};

type NodeId = usize;

struct Node<T> {
    value: T,
    up: Option<NodeId>,
    down: [Option<NodeId>; 2],
}

/// α-weight-balanced binary search tree ordered by a user-supplied compare.
pub struct ScapegoatTree<T> {
    header: Header,
    nodes: Vec<Option<Node<T>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    max_size: usize,
    compare: Box<dyn Fn(&T, &T) -> core::cmp::Ordering>,
    destructor: Option<Box<dyn FnMut(&mut T)>>,
    error_fn: Option<Box<dyn FnMut(&str, Error)>>,
}

impl<T: Ord> ScapegoatTree<T> {
    pub fn new() -> Self {
        Self::with_compare(|a, b| a.cmp(b))
    }
}

impl<T: Ord> Default for ScapegoatTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScapegoatTree<T> {
    pub fn with_compare(compare: impl Fn(&T, &T) -> core::cmp::Ordering + 'static) -> Self {
        ScapegoatTree {
            header: Header::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            max_size: 0,
            compare: Box::new(compare),
            destructor: None,
            error_fn: None,
        }
    }

    pub fn set_destructor(&mut self, f: impl FnMut(&mut T) + 'static) {
        self.destructor = Some(Box::new(f));
    }

    pub fn set_error_function(&mut self, f: impl FnMut(&str, Error) + 'static) {
        self.error_fn = Some(Box::new(f));
    }

    fn report(&mut self, site: &str, err: Error) -> Error {
        if let Some(f) = self.error_fn.as_mut() {
            f(site, err);
        }
        err
    }

    fn notify(&self, event: Event) {
        if self.header.has_observer() {
            observer::notify(subject_id(self), event, 0, 0);
        }
    }

    fn alloc(&mut self, value: T, up: Option<NodeId>) -> NodeId {
        let node = Node { value, up, down: [None, None] };
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        self.nodes[id].as_ref().expect("live node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.nodes[id].as_mut().expect("live node id")
    }

    fn subtree_size(&self, id: Option<NodeId>) -> usize {
        match id {
            None => 0,
            Some(id) => 1 + self.subtree_size(self.node(id).down[0]) + self.subtree_size(self.node(id).down[1]),
        }
    }

    /// ⌊log_{1/α}(size)⌋ with α = √2⁄2, i.e. 1/α = √2: this is ⌊log2(size)·2⌋/2
    /// approximated in integers as `ceil(log2(size) * 2)`.
    fn depth_limit(size: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let log2 = usize::BITS as usize - 1 - size.leading_zeros() as usize;
        log2 * 2 + 1
    }

    fn find_id(&self, key: &T) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            match (self.compare)(key, &self.node(id).value) {
                core::cmp::Ordering::Equal => return Some(id),
                core::cmp::Ordering::Less => cur = self.node(id).down[0],
                core::cmp::Ordering::Greater => cur = self.node(id).down[1],
            }
        }
        None
    }

    pub fn contains(&self, key: &T) -> bool {
        self.find_id(key).is_some()
    }

    pub fn find(&self, key: &T) -> Option<&T> {
        self.find_id(key).map(|id| &self.node(id).value)
    }

    /// Insert `value`, rejecting duplicates (per the compare function).
    /// `Err(Incompatible)` if an equal key is already present.
    pub fn insert(&mut self, value: T) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report("ScapegoatTree.Insert", Error::ReadOnly));
        }
        self.add_internal(value, true)?;
        self.notify(Event::Insert);
        Ok(())
    }

    /// Insert `value`, overwriting any node that compares equal.
    pub fn add(&mut self, value: T) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report("ScapegoatTree.Add", Error::ReadOnly));
        }
        self.add_internal(value, false)?;
        self.notify(Event::Add);
        Ok(())
    }

    fn add_internal(&mut self, value: T, reject_dup: bool) -> Result<()> {
        let Some(root) = self.root else {
            let id = self.alloc(value, None);
            self.root = Some(id);
            self.header.count = 1;
            self.max_size = 1;
            self.header.touch();
            return Ok(());
        };

        let mut depth = 0usize;
        let mut cur = root;
        loop {
            depth += 1;
            match (self.compare)(&value, &self.node(cur).value) {
                core::cmp::Ordering::Equal => {
                    if reject_dup {
                        return Err(self.report("ScapegoatTree.Insert", Error::Incompatible));
                    }
                    self.node_mut(cur).value = value;
                    self.header.touch();
                    return Ok(());
                }
                core::cmp::Ordering::Less => match self.node(cur).down[0] {
                    Some(next) => cur = next,
                    None => {
                        let id = self.alloc(value, Some(cur));
                        self.node_mut(cur).down[0] = Some(id);
                        break;
                    }
                },
                core::cmp::Ordering::Greater => match self.node(cur).down[1] {
                    Some(next) => cur = next,
                    None => {
                        let id = self.alloc(value, Some(cur));
                        self.node_mut(cur).down[1] = Some(id);
                        break;
                    }
                },
            }
        }
        self.header.count += 1;
        self.max_size = self.max_size.max(self.header.count);
        self.header.touch();

        if depth + 1 > Self::depth_limit(self.header.count) {
            self.rebalance_from_leaf(cur);
        }
        Ok(())
    }

    /// Walk upward from a just-inserted leaf's parent until a node whose
    /// subtree violates the weight balance is found, then rebuild it.
    fn rebalance_from_leaf(&mut self, mut child: NodeId) {
        loop {
            let Some(parent) = self.node(child).up else { return };
            let size = self.subtree_size(Some(parent));
            let depth_from_here = self.depth_from(parent, child) + 1;
            if depth_from_here > Self::depth_limit(size) {
                self.rebuild_subtree(parent);
                return;
            }
            child = parent;
        }
    }

    fn depth_from(&self, ancestor: NodeId, mut descendant: NodeId) -> usize {
        let mut depth = 0;
        while descendant != ancestor {
            descendant = self.node(descendant).up.expect("ancestor reachable");
            depth += 1;
        }
        depth
    }

    /// Stout–Warren: flatten the subtree rooted at `id` into a right-linked
    /// vine, then repeatedly compress it into a balanced shape.
    ///
    /// `up` links are left stale during flattening/compression (they are
    /// irrelevant to which rotation runs next) and restored in one
    /// recursive pass at the end, via [`Self::fix_parent_links`].
    fn rebuild_subtree(&mut self, id: NodeId) {
        let parent = self.node(id).up;
        let was_left_child = parent.map(|p| self.node(p).down[0] == Some(id));
        let size = self.subtree_size(Some(id));

        let vine_head = self.tree_to_vine(id);
        let new_root = self.vine_to_tree(vine_head, size);
        self.fix_parent_links(new_root, parent);

        match (parent, was_left_child) {
            (None, _) => self.root = Some(new_root),
            (Some(p), Some(true)) => self.node_mut(p).down[0] = Some(new_root),
            (Some(p), Some(false)) => self.node_mut(p).down[1] = Some(new_root),
            _ => unreachable!(),
        }
    }

    fn fix_parent_links(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.node_mut(id).up = parent;
        let (left, right) = (self.node(id).down[0], self.node(id).down[1]);
        if let Some(l) = left {
            self.fix_parent_links(l, Some(id));
        }
        if let Some(r) = right {
            self.fix_parent_links(r, Some(id));
        }
    }

    /// Right-rotate repeatedly until the subtree rooted at `root` becomes a
    /// singly right-linked list (a "vine"); returns the vine's head. `down[0]`
    /// is garbage on non-head nodes mid-pass but `None` everywhere once done.
    fn tree_to_vine(&mut self, root: NodeId) -> NodeId {
        let mut tail: Option<NodeId> = None;
        let mut head = root;
        let mut rest = Some(root);
        while let Some(r) = rest {
            match self.node(r).down[0] {
                None => {
                    tail = Some(r);
                    rest = self.node(r).down[1];
                }
                Some(temp) => {
                    let temp_right = self.node(temp).down[1];
                    self.node_mut(r).down[0] = temp_right;
                    self.node_mut(temp).down[1] = Some(r);
                    rest = Some(temp);
                    match tail {
                        None => head = temp,
                        Some(t) => self.node_mut(t).down[1] = Some(temp),
                    }
                }
            }
        }
        head
    }

    /// Compress a right-linked vine of `size` nodes (rooted at `head`) into a
    /// balanced tree via the standard leaf-then-halving compression schedule;
    /// returns the new subtree root.
    fn vine_to_tree(&mut self, head: NodeId, size: usize) -> NodeId {
        if size == 0 {
            return head;
        }
        let full = 1usize << (usize::BITS as usize - 1 - (size + 1).leading_zeros() as usize);
        let leaves = size + 1 - full;
        let mut root = self.compress(head, leaves);
        let mut remaining = size - leaves;
        while remaining > 1 {
            remaining /= 2;
            root = self.compress(root, remaining);
        }
        root
    }

    /// One pass of `count` left-rotations along the vine headed at `head`,
    /// each pulling every other node up a level; returns the new vine head.
    fn compress(&mut self, head: NodeId, count: usize) -> NodeId {
        let mut scanner: Option<NodeId> = None;
        let mut result_head = head;
        for _ in 0..count {
            let child = match scanner {
                None => result_head,
                Some(s) => self.node(s).down[1].expect("count bounded by vine length"),
            };
            let grandchild = self.node(child).down[1].expect("count bounded by vine length");
            let grandchild_left = self.node(grandchild).down[0];

            match scanner {
                None => result_head = grandchild,
                Some(s) => self.node_mut(s).down[1] = Some(grandchild),
            }
            self.node_mut(child).down[1] = grandchild_left;
            self.node_mut(grandchild).down[0] = Some(child);
            scanner = Some(grandchild);
        }
        result_head
    }

    /// Remove the node matching `key`. `Err(NotFound)` if absent.
    pub fn erase(&mut self, key: &T) -> Result<T> {
        if self.header.is_read_only() {
            return Err(self.report("ScapegoatTree.Erase", Error::ReadOnly));
        }
        let Some(id) = self.find_id(key) else {
            return Err(self.report("ScapegoatTree.Erase", Error::NotFound));
        };
        let value = self.remove_node(id);
        self.header.count -= 1;
        self.header.touch();
        if self.max_size > 0 && self.header.count < 3 * self.max_size / 4 {
            if let Some(root) = self.root {
                self.rebuild_subtree(root);
            }
            self.max_size = self.header.count;
        }
        self.notify(Event::EraseAt);
        Ok(value)
    }

    fn remove_node(&mut self, id: NodeId) -> T {
        let (left, right) = (self.node(id).down[0], self.node(id).down[1]);
        let replacement = match (left, right) {
            (None, None) => None,
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (Some(_), Some(r)) => {
                let mut successor = r;
                while let Some(next) = self.node(successor).down[0] {
                    successor = next;
                }
                if successor != r {
                    let succ_right = self.node(successor).down[1];
                    let succ_parent = self.node(successor).up.expect("not root of subtree");
                    self.node_mut(succ_parent).down[0] = succ_right;
                    if let Some(sr) = succ_right {
                        self.node_mut(sr).up = Some(succ_parent);
                    }
                    self.node_mut(successor).down[1] = Some(r);
                    self.node_mut(r).up = Some(successor);
                }
                self.node_mut(successor).down[0] = left;
                if let Some(l) = left {
                    self.node_mut(l).up = Some(successor);
                }
                Some(successor)
            }
        };

        let parent = self.node(id).up;
        if let Some(rep) = replacement {
            self.node_mut(rep).up = parent;
        }
        match parent {
            None => self.root = replacement,
            Some(p) => {
                if self.node(p).down[0] == Some(id) {
                    self.node_mut(p).down[0] = replacement;
                } else {
                    self.node_mut(p).down[1] = replacement;
                }
            }
        }

        let mut removed = self.nodes[id].take().expect("live node").value;
        if let Some(d) = self.destructor.as_mut() {
            d(&mut removed);
        }
        self.free.push(id);
        removed
    }

    fn leftmost_from(&self, mut id: NodeId) -> NodeId {
        while let Some(l) = self.node(id).down[0] {
            id = l;
        }
        id
    }

    /// In-order successor of the node at `id`, used by [`Self::iter`].
    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(r) = self.node(id).down[1] {
            return Some(self.leftmost_from(r));
        }
        let mut cur = id;
        let mut parent = self.node(cur).up;
        while let Some(p) = parent {
            if self.node(p).down[0] == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.node(p).up;
        }
        None
    }

    /// First element in ascending order.
    pub fn first(&self) -> Option<&T> {
        self.root.map(|r| &self.node(self.leftmost_from(r)).value)
    }

    /// Ascending in-order iterator.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { tree: self, cur: self.root.map(|r| self.leftmost_from(r)) }
    }

    /// Walk every `(in-order position)` calling `f`; stop early on `false`.
    pub fn apply(&self, mut f: impl FnMut(&T) -> bool) {
        for value in self.iter() {
            if !f(value) {
                break;
            }
        }
    }

    /// Write the kind tag, header, and every element in ascending order to
    /// `stream`, encoding each element with `encode`.
    pub fn save(&self, stream: &mut dyn Stream, mut encode: impl FnMut(&T, &mut dyn Stream) -> Result<()>) -> Result<()> {
        serialize::write_frame(stream, SCAPEGOAT_TAG, FrameHeader { count: self.header.count as u64, flags: self.header.flags })?;
        for value in self.iter() {
            encode(value, stream)?;
        }
        Ok(())
    }
}

impl<T: Ord> ScapegoatTree<T> {
    /// Read back a tree previously written by [`ScapegoatTree::save`].
    /// `Err(Error::WrongFile)` if the stream's kind tag doesn't match. The
    /// rebuilt tree's shape need not match the original's: only the
    /// ascending sequence of elements is preserved.
    pub fn load(stream: &mut dyn Stream, mut decode: impl FnMut(&mut dyn Stream) -> Result<T>) -> Result<ScapegoatTree<T>> {
        let header = serialize::read_frame(stream, SCAPEGOAT_TAG)?;
        let mut out = ScapegoatTree::new();
        for _ in 0..header.count {
            out.insert(decode(stream)?)?;
        }
        out.header.flags = header.flags;
        Ok(out)
    }
}

impl<T: Clone> ScapegoatTree<T> {
    /// Build a structurally independent copy preserving in-order contents.
    pub fn copy(&self) -> ScapegoatTree<T>
    where
        T: Ord,
    {
        let mut out = ScapegoatTree::new();
        for value in self.iter() {
            out.insert(value.clone()).expect("source tree has no duplicate keys");
        }
        out
    }
}

impl<T: PartialEq> ScapegoatTree<T> {
    /// Structural equality by in-order sequence.
    pub fn equal(&self, other: &ScapegoatTree<T>) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<T> ScapegoatTree<T> {
    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Remove every element, running the destructor on each.
    pub fn clear(&mut self) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report("ScapegoatTree.Clear", Error::ReadOnly));
        }
        if let Some(d) = self.destructor.as_mut() {
            for slot in self.nodes.iter_mut().flatten() {
                d(&mut slot.value);
            }
        }
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.max_size = 0;
        self.header.count = 0;
        self.header.touch();
        self.notify(Event::Clear);
        Ok(())
    }
}

/// Ascending in-order iterator over a [`ScapegoatTree`]'s elements.
pub struct Iter<'a, T> {
    tree: &'a ScapegoatTree<T>,
    cur: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let id = self.cur?;
        self.cur = self.tree.successor(id);
        Some(&self.tree.node(id).value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_insert_and_find() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in [5, 3, 8, 1, 4, 7, 9] {
            t.insert(v).unwrap();
        }
        for v in [5, 3, 8, 1, 4, 7, 9] {
            assert!(t.contains(&v));
        }
        assert!(!t.contains(&100));
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        t.insert(1).unwrap();
        assert_eq!(t.insert(1), Err(Error::Incompatible));
    }

    #[test]
    fn test_add_overwrites() {
        let mut t: ScapegoatTree<(i32, i32)> = ScapegoatTree::with_compare(|a, b| a.0.cmp(&b.0));
        t.add((1, 100)).unwrap();
        t.add((1, 200)).unwrap();
        assert_eq!(t.find(&(1, 0)), Some(&(1, 200)));
    }

    #[test]
    fn test_ordered_iteration() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in [5, 3, 8, 1, 4, 7, 9, 2, 6, 0] {
            t.insert(v).unwrap();
        }
        let collected: Vec<i32> = t.iter().copied().collect();
        assert_eq!(collected, alloc::vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_erase_removes_and_rebalances() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in 0..50 {
            t.insert(v).unwrap();
        }
        for v in 0..40 {
            t.erase(&v).unwrap();
        }
        let collected: Vec<i32> = t.iter().copied().collect();
        let expected: Vec<i32> = (40..50).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_erase_missing_is_not_found() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        t.insert(1).unwrap();
        assert_eq!(t.erase(&2), Err(Error::NotFound));
    }

    #[test]
    fn test_large_ascending_insert_stays_balanced_enough() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in 0..500 {
            t.insert(v).unwrap();
        }
        let collected: Vec<i32> = t.iter().copied().collect();
        let expected: Vec<i32> = (0..500).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_copy_and_equal() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in [3, 1, 2] {
            t.insert(v).unwrap();
        }
        let copy = t.copy();
        assert!(t.equal(&copy));
    }

    #[test]
    fn test_apply_visits_in_order() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in [2, 1, 3] {
            t.insert(v).unwrap();
        }
        let mut seen = Vec::new();
        t.apply(|v| {
            seen.push(*v);
            true
        });
        assert_eq!(seen, alloc::vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_empties_tree() {
        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        t.insert(1).unwrap();
        t.insert(2).unwrap();
        t.clear().unwrap();
        assert_eq!(t.len(), 0);
        assert!(t.first().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        use crate::serialize::MemoryStream;

        let mut t: ScapegoatTree<i32> = ScapegoatTree::new();
        for v in [5, 3, 8, 1, 4] {
            t.insert(v).unwrap();
        }
        let mut out = MemoryStream::new();
        t.save(&mut out, |v, s| s.write_all(&v.to_le_bytes())).unwrap();

        let mut input = MemoryStream::from_bytes(out.into_inner());
        let loaded: ScapegoatTree<i32> = ScapegoatTree::load(&mut input, |s| {
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf)?;
            Ok(i32::from_le_bytes(buf))
        })
        .unwrap();

        assert!(t.equal(&loaded));
    }

    #[test]
    fn test_load_rejects_wrong_tag() {
        use crate::serialize::{write_frame, MemoryStream, LIST_TAG};

        let mut out = MemoryStream::new();
        write_frame(&mut out, LIST_TAG, crate::serialize::FrameHeader { count: 0, flags: 0 }).unwrap();
        let mut input = MemoryStream::from_bytes(out.into_inner());
        let result: Result<ScapegoatTree<i32>> = ScapegoatTree::load(&mut input, |s| {
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf)?;
            Ok(i32::from_le_bytes(buf))
        });
        assert_eq!(result.err(), Some(Error::WrongFile));
    }
}
