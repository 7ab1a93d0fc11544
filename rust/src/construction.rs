//! Construction and initialization logic for BPlusTree and nodes.
//!
//! This module contains order validation, the split-point rule shared by leaf
//! and internal splits, node constructors, and tree creation.

use crate::arena::NodeArena;
use crate::error::{StoreError, StoreResult};
use crate::types::{BPlusTree, BlockPointer, InternalNode, Key, LeafNode, Node, MAX_ORDER, MIN_ORDER};

/// Split point for a sequence of `size` entries: `size / 2` when even,
/// `size / 2 + 1` when odd.
///
/// Leaf splits apply it to `2m`, internal splits to `2m + 1`.
pub fn cut(size: usize) -> usize {
    if size % 2 == 0 {
        size / 2
    } else {
        size / 2 + 1
    }
}

/// Validate that an order is suitable for tree nodes.
pub fn validate_order(order: usize) -> StoreResult<()> {
    if order < MIN_ORDER {
        Err(StoreError::invalid_order(order, MIN_ORDER))
    } else if order > MAX_ORDER {
        Err(StoreError::order_too_large(order, MAX_ORDER))
    } else {
        Ok(())
    }
}

impl BPlusTree {
    /// Create a tree holding exactly one entry in a single root leaf.
    ///
    /// # Arguments
    ///
    /// * `order` - Tree order `m`; nodes hold at most `2m` keys
    /// * `key` - The first key
    /// * `block` - Block pointer stored under `key`
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketdb::BPlusTree;
    ///
    /// let tree = BPlusTree::create(2, 7, 0).unwrap();
    /// assert_eq!(tree.len(), 1);
    /// assert_eq!(tree.get(7), Some(0));
    /// ```
    pub fn create(order: usize, key: Key, block: BlockPointer) -> StoreResult<Self> {
        validate_order(order)?;

        let mut leaf = LeafNode::new(2 * order);
        leaf.keys.push(key);
        leaf.blocks.push(block);

        let mut nodes = NodeArena::new();
        let root = nodes.allocate(Node::Leaf(leaf))?;

        Ok(Self { order, root, nodes })
    }

    /// Order `m` of this tree.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Maximum number of keys per node (`2m`).
    pub fn max_keys(&self) -> usize {
        2 * self.order
    }

    /// Maximum number of children per internal node (`2m + 1`).
    pub fn max_children(&self) -> usize {
        2 * self.order + 1
    }
}

impl LeafNode {
    /// Creates an empty, unlinked, parentless leaf. Storage grows on insert.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::new(),
            blocks: Vec::new(),
            next: None,
            parent: None,
        }
    }
}

impl InternalNode {
    /// Creates an empty, parentless internal node. Holds up to `capacity`
    /// keys and `capacity + 1` children once filled.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut() {
        assert_eq!(cut(2), 1);
        assert_eq!(cut(3), 2);
        assert_eq!(cut(4), 2);
        assert_eq!(cut(5), 3);
        assert_eq!(cut(16), 8);
        assert_eq!(cut(17), 9);
    }

    #[test]
    fn test_create_single_leaf_tree() {
        let tree = BPlusTree::create(1, 42, 4096).unwrap();
        assert_eq!(tree.order(), 1);
        assert_eq!(tree.max_keys(), 2);
        assert_eq!(tree.max_children(), 3);

        let root = tree.get_leaf(tree.root()).unwrap();
        assert_eq!(root.keys, vec![42]);
        assert_eq!(root.blocks, vec![4096]);
        assert_eq!(root.next, None);
        assert_eq!(root.parent, None);
    }

    #[test]
    fn test_invalid_order() {
        let err = BPlusTree::create(0, 1, 0).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOrder(_)));
        assert!(validate_order(1).is_ok());
    }

    #[test]
    fn test_oversized_order_is_rejected() {
        let err = BPlusTree::create(usize::MAX / 4, 1, 0).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOrder(_)));
        assert!(err.to_string().contains("maximum"));
        assert!(validate_order(MAX_ORDER + 1).is_err());

        let tree = BPlusTree::create(MAX_ORDER, 1, 0).unwrap();
        assert_eq!(tree.max_keys(), 2 * MAX_ORDER);
        assert_eq!(tree.get(1), Some(0));
    }

    #[test]
    fn test_node_construction() {
        let leaf = LeafNode::new(4);
        assert_eq!(leaf.capacity, 4);
        assert!(leaf.keys.is_empty());

        let internal = InternalNode::new(4);
        assert_eq!(internal.capacity, 4);
        assert!(internal.children.is_empty());
    }
}
