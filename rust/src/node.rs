//! Node implementations for the B+ tree.
//!
//! This module contains the node-level halves of insertion: sorted insertion
//! into a leaf or internal node, and the two split rules. Arena allocation,
//! sibling linking and parent propagation are done by the tree in
//! `insert_operations`.

use crate::construction::cut;
use crate::types::{BlockPointer, InternalNode, InternalSplit, Key, LeafNode, LeafSplit, NodeId};

// ============================================================================
// LEAF NODE IMPLEMENTATION
// ============================================================================

impl LeafNode {
    /// Returns the number of entries in this leaf.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if this leaf holds no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if this leaf is at capacity.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Block pointers, parallel to `keys()`.
    pub fn blocks(&self) -> &[BlockPointer] {
        &self.blocks
    }

    /// Next leaf in the chain.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Block pointer of the first entry stored under `key`.
    pub fn get(&self, key: Key) -> Option<BlockPointer> {
        let index = self.keys.partition_point(|k| *k < key);
        match self.keys.get(index) {
            Some(k) if *k == key => Some(self.blocks[index]),
            _ => None,
        }
    }

    /// Position for a new entry: right after any entries with an equal key.
    #[inline]
    fn insert_position(&self, key: Key) -> usize {
        self.keys.partition_point(|k| *k <= key)
    }

    /// Insert an entry in sorted position, shifting later entries right.
    ///
    /// The caller checks capacity first.
    pub(crate) fn insert_sorted(&mut self, key: Key, block: BlockPointer) {
        let index = self.insert_position(key);
        self.keys.insert(index, key);
        self.blocks.insert(index, block);
    }

    /// Split a full leaf while inserting one more entry.
    ///
    /// The `2m + 1` entries are divided at `cut(2m)`: this leaf keeps the
    /// first part and the returned right leaf takes the remainder along with
    /// this leaf's old `next` link. The caller allocates the right leaf and
    /// points `self.next` at it.
    pub(crate) fn split_insert(&mut self, key: Key, block: BlockPointer) -> LeafSplit {
        self.insert_sorted(key, block);

        let split = cut(self.capacity);
        let right_keys = self.keys.split_off(split);
        let right_blocks = self.blocks.split_off(split);
        let separator = right_keys[0];

        let right = LeafNode {
            capacity: self.capacity,
            keys: right_keys,
            blocks: right_blocks,
            next: self.next.take(),
            parent: self.parent,
        };

        LeafSplit { right, separator }
    }
}

// ============================================================================
// INTERNAL NODE IMPLEMENTATION
// ============================================================================

impl InternalNode {
    /// Returns the number of separator keys in this node.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if this node holds no separators.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if this node is at capacity.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// Separator keys in ascending order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Child node IDs, one more than `keys()`.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Index of the child to descend into for `key`: past every separator
    /// less than or equal to `key`.
    #[inline]
    pub fn find_child_index(&self, key: Key) -> usize {
        self.keys.partition_point(|k| *k <= key)
    }

    /// Index of the first child that can hold entries equal to `key`.
    #[inline]
    pub(crate) fn lower_bound_child_index(&self, key: Key) -> usize {
        self.keys.partition_point(|k| *k < key)
    }

    /// Position of `child` among this node's children.
    pub fn position_of(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|c| *c == child)
    }

    /// Insert a separator and its right child after the child at `left_index`.
    pub(crate) fn insert_child(&mut self, left_index: usize, key: Key, right: NodeId) {
        self.keys.insert(left_index, key);
        self.children.insert(left_index + 1, right);
    }

    /// Split a full node while inserting one more separator/child pair.
    ///
    /// With `2m + 1` keys and `2m + 2` children and `split = cut(2m + 1)`,
    /// this node keeps `split - 1` keys and `split` children, the key at
    /// `split - 1` moves up (it stays in neither half), and the returned right
    /// node takes the rest. The caller reparents the moved children.
    pub(crate) fn split_insert(&mut self, left_index: usize, key: Key, right: NodeId) -> InternalSplit {
        self.insert_child(left_index, key, right);

        let split = cut(self.capacity + 1);
        let right_keys = self.keys.split_off(split);
        let right_children = self.children.split_off(split);
        let promoted = self.keys.pop().unwrap_or(key);

        let right = InternalNode {
            capacity: self.capacity,
            keys: right_keys,
            children: right_children,
            parent: self.parent,
        };

        InternalSplit { right, promoted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(capacity: usize, keys: &[Key]) -> LeafNode {
        let mut leaf = LeafNode::new(capacity);
        for &k in keys {
            leaf.insert_sorted(k, k as BlockPointer * 10);
        }
        leaf
    }

    #[test]
    fn test_insert_sorted_keeps_order() {
        let leaf = leaf_with(4, &[30, 10, 20]);
        assert_eq!(leaf.keys(), &[10, 20, 30]);
        assert_eq!(leaf.blocks(), &[100, 200, 300]);
        assert!(!leaf.is_full());
    }

    #[test]
    fn test_duplicates_insert_after_equal_keys() {
        let mut leaf = LeafNode::new(4);
        leaf.insert_sorted(5, 1);
        leaf.insert_sorted(7, 2);
        leaf.insert_sorted(5, 3);
        assert_eq!(leaf.keys(), &[5, 5, 7]);
        assert_eq!(leaf.blocks(), &[1, 3, 2]);
        assert_eq!(leaf.get(5), Some(1));
    }

    #[test]
    fn test_leaf_split_order_one() {
        let mut leaf = leaf_with(2, &[10, 20]);
        leaf.next = Some(9);
        let LeafSplit { right, separator } = leaf.split_insert(30, 300);

        assert_eq!(leaf.keys(), &[10]);
        assert_eq!(right.keys(), &[20, 30]);
        assert_eq!(right.blocks(), &[200, 300]);
        assert_eq!(separator, 20);
        assert_eq!(right.next, Some(9));
        assert_eq!(leaf.next, None);
    }

    #[test]
    fn test_leaf_split_new_key_on_left() {
        let mut leaf = leaf_with(4, &[10, 20, 30, 40]);
        let split = leaf.split_insert(5, 50);

        assert_eq!(leaf.keys(), &[5, 10]);
        assert_eq!(split.right.keys(), &[20, 30, 40]);
        assert_eq!(split.separator, 20);
    }

    #[test]
    fn test_internal_split_promotes_without_duplicating() {
        // order 1: 2 keys, 3 children
        let mut node = InternalNode::new(2);
        node.keys = vec![10, 20];
        node.children = vec![100, 101, 102];

        // Insert separator 30 with right child 103 after child index 2.
        let InternalSplit { right, promoted } = node.split_insert(2, 30, 103);

        assert_eq!(promoted, 20);
        assert_eq!(node.keys(), &[10]);
        assert_eq!(node.children(), &[100, 101]);
        assert_eq!(right.keys(), &[30]);
        assert_eq!(right.children(), &[102, 103]);
    }

    #[test]
    fn test_internal_split_order_two() {
        let mut node = InternalNode::new(4);
        node.keys = vec![10, 20, 30, 40];
        node.children = vec![0, 1, 2, 3, 4];

        let split = node.split_insert(0, 5, 9);

        // temp keys [5,10,20,30,40], children [0,9,1,2,3,4]; split = 3
        assert_eq!(node.keys(), &[5, 10]);
        assert_eq!(node.children(), &[0, 9, 1]);
        assert_eq!(split.promoted, 20);
        assert_eq!(split.right.keys(), &[30, 40]);
        assert_eq!(split.right.children(), &[2, 3, 4]);
    }

    #[test]
    fn test_find_child_index() {
        let mut node = InternalNode::new(4);
        node.keys = vec![10, 20];
        node.children = vec![0, 1, 2];

        assert_eq!(node.find_child_index(5), 0);
        assert_eq!(node.find_child_index(10), 1);
        assert_eq!(node.find_child_index(15), 1);
        assert_eq!(node.find_child_index(20), 2);
        assert_eq!(node.find_child_index(99), 2);
        assert_eq!(node.lower_bound_child_index(10), 0);
        assert_eq!(node.position_of(2), Some(2));
        assert_eq!(node.position_of(7), None);
    }
}
