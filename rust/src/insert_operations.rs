//! INSERT operations for BPlusTree.
//!
//! This module contains insertion into the tree: locating the target leaf,
//! splitting full leaves and internal nodes, propagating promoted keys to the
//! parent, and growing a new root when the old root splits.

use crate::error::{StoreError, StoreResult, TreeResult};
use crate::types::{
    BPlusTree, BlockPointer, InternalNode, InternalSplit, Key, LeafSplit, Node, NodeId,
};

impl BPlusTree {
    /// Insert `key -> block` and return the (possibly new) root ID.
    ///
    /// Duplicate keys are kept; the new entry goes after existing entries with
    /// the same key.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketdb::BPlusTree;
    ///
    /// let mut tree = BPlusTree::create(1, 10, 0).unwrap();
    /// let old_root = tree.root();
    /// tree.insert(20, 0).unwrap();
    /// let new_root = tree.insert(30, 0).unwrap();
    /// assert_ne!(old_root, new_root);
    /// assert_eq!(tree.root(), new_root);
    /// ```
    pub fn insert(&mut self, key: Key, block: BlockPointer) -> StoreResult<NodeId> {
        let leaf_id = self.find_leaf(key)?;
        let leaf = self.leaf_mut(leaf_id)?;

        if !leaf.is_full() {
            leaf.insert_sorted(key, block);
            return Ok(self.root);
        }

        self.insert_leaf_after_split(leaf_id, key, block)
    }

    /// Split a full leaf, link the new right leaf into the chain, and push its
    /// first key up to the parent.
    fn insert_leaf_after_split(
        &mut self,
        leaf_id: NodeId,
        key: Key,
        block: BlockPointer,
    ) -> TreeResult<NodeId> {
        let LeafSplit { right, separator } = self.leaf_mut(leaf_id)?.split_insert(key, block);
        let right_id = self.allocate_node(Node::Leaf(right))?;
        self.leaf_mut(leaf_id)?.next = Some(right_id);

        tracing::debug!(leaf = leaf_id, new_leaf = right_id, separator, "split leaf");

        self.insert_parent(leaf_id, separator, right_id)
    }

    /// Attach `right` next to `left` under `left`'s parent with separator `key`.
    fn insert_parent(&mut self, left: NodeId, key: Key, right: NodeId) -> TreeResult<NodeId> {
        let Some(parent_id) = self.node_ref(left)?.parent() else {
            return self.insert_new_root(left, key, right);
        };

        let parent = self.internal_mut(parent_id)?;
        let left_index = parent.position_of(left).ok_or_else(|| {
            StoreError::corrupted_tree(
                "Parent link",
                &format!("node {} is not a child of its parent {}", left, parent_id),
            )
        })?;

        if !parent.is_full() {
            parent.insert_child(left_index, key, right);
            self.node_mut(right)?.set_parent(Some(parent_id));
            return Ok(self.root);
        }

        self.insert_internal_after_split(parent_id, left_index, key, right)
    }

    /// Split a full internal node while inserting `(key, right)` after the
    /// child at `left_index`, then promote the middle key.
    fn insert_internal_after_split(
        &mut self,
        node_id: NodeId,
        left_index: usize,
        key: Key,
        right: NodeId,
    ) -> TreeResult<NodeId> {
        let InternalSplit {
            right: new_node,
            promoted,
        } = self.internal_mut(node_id)?.split_insert(left_index, key, right);

        // The inserted child may have landed in either half; the loop below
        // fixes it if it moved right.
        self.node_mut(right)?.set_parent(Some(node_id));

        let moved = new_node.children.clone();
        let new_id = self.allocate_node(Node::Internal(new_node))?;
        for child in moved {
            self.node_mut(child)?.set_parent(Some(new_id));
        }

        tracing::debug!(node = node_id, new_node = new_id, promoted, "split internal node");

        self.insert_parent(node_id, promoted, new_id)
    }

    /// Grow the tree by one level: a new root with one separator and two children.
    fn insert_new_root(&mut self, left: NodeId, key: Key, right: NodeId) -> TreeResult<NodeId> {
        let mut root = InternalNode::new(self.max_keys());
        root.keys.push(key);
        root.children.push(left);
        root.children.push(right);

        let root_id = self.allocate_node(Node::Internal(root))?;
        self.node_mut(left)?.set_parent(Some(root_id));
        self.node_mut(right)?.set_parent(Some(root_id));
        self.root = root_id;

        tracing::debug!(root = root_id, separator = key, "created new root");

        Ok(root_id)
    }
}
