//! Tree navigation and structure queries for BPlusTree.
//!
//! This module contains leaf lookup, point queries, and size/shape queries
//! (entry count, height, node counts).

use crate::error::{StoreError, StoreResult};
use crate::types::{BPlusTree, BlockPointer, Key, Node, NodeId};

impl BPlusTree {
    /// ID of the root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Find the leaf that would currently hold `key`.
    ///
    /// At each internal node this advances past every separator less than or
    /// equal to `key` and follows that child, falling to the rightmost child
    /// when every separator is `<= key`. The key is not guaranteed to be
    /// present in the returned leaf.
    pub fn find_leaf(&self, key: Key) -> StoreResult<NodeId> {
        let mut current = self.root;

        loop {
            match self.node_ref(current)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(internal) => {
                    let index = internal.find_child_index(key);
                    current = *internal.children.get(index).ok_or_else(move || {
                        StoreError::corrupted_tree(
                            "Internal node",
                            &format!("node {} has no child at {}", current, index),
                        )
                    })?;
                }
            }
        }
    }

    /// Block pointer stored under `key` in the leaf `find_leaf` reaches.
    pub fn get(&self, key: Key) -> Option<BlockPointer> {
        let leaf_id = self.find_leaf(key).ok()?;
        self.get_leaf(leaf_id)?.get(key)
    }

    /// Every block pointer stored under `key`, in insertion order.
    ///
    /// Equal keys can span several leaves after splits, so this descends to
    /// the leftmost leaf that may hold `key` and then follows the leaf chain.
    pub fn find_all(&self, key: Key) -> Vec<BlockPointer> {
        let mut found = Vec::new();
        let Some(mut leaf_id) = self.lower_bound_leaf(key) else {
            return found;
        };

        loop {
            let Some(leaf) = self.get_leaf(leaf_id) else {
                return found;
            };
            for (k, block) in leaf.keys.iter().zip(&leaf.blocks) {
                if *k > key {
                    return found;
                }
                if *k == key {
                    found.push(*block);
                }
            }
            match leaf.next {
                Some(next) => leaf_id = next,
                None => return found,
            }
        }
    }

    /// Leftmost leaf that can hold entries equal to `key`.
    fn lower_bound_leaf(&self, key: Key) -> Option<NodeId> {
        let mut current = self.root;

        loop {
            match self.node(current)? {
                Node::Leaf(_) => return Some(current),
                Node::Internal(internal) => {
                    let index = internal.lower_bound_child_index(key);
                    current = *internal.children.get(index)?;
                }
            }
        }
    }

    /// Get the ID of the first (leftmost) leaf in the tree
    pub fn first_leaf_id(&self) -> Option<NodeId> {
        let mut current = self.root;

        loop {
            match self.node(current)? {
                Node::Leaf(_) => return Some(current),
                Node::Internal(internal) => current = *internal.children.first()?,
            }
        }
    }

    /// Returns the number of entries in the tree.
    pub fn len(&self) -> usize {
        self.len_recursive(self.root)
    }

    fn len_recursive(&self, id: NodeId) -> usize {
        match self.node(id) {
            Some(Node::Leaf(leaf)) => leaf.len(),
            Some(Node::Internal(internal)) => internal
                .children
                .iter()
                .map(|child| self.len_recursive(*child))
                .sum(),
            None => 0,
        }
    }

    /// Returns true if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels from the root down to the leaves (1 for a leaf root).
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;
        while let Some(Node::Internal(internal)) = self.node(current) {
            match internal.children.first() {
                Some(child) => current = *child,
                None => break,
            }
            height += 1;
        }
        height
    }

    /// Total number of nodes. Nodes are never freed, so every allocated node
    /// is part of the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Count the number of leaf and internal nodes reachable from the root.
    pub fn count_nodes_in_tree(&self) -> (usize, usize) {
        self.count_nodes_recursive(self.root)
    }

    fn count_nodes_recursive(&self, id: NodeId) -> (usize, usize) {
        match self.node(id) {
            Some(Node::Leaf(_)) => (1, 0),
            Some(Node::Internal(internal)) => {
                let mut total_leaves = 0;
                let mut total_internal = 1;
                for child in &internal.children {
                    let (leaves, internals) = self.count_nodes_recursive(*child);
                    total_leaves += leaves;
                    total_internal += internals;
                }
                (total_leaves, total_internal)
            }
            None => (0, 0),
        }
    }

    /// Returns the number of leaf nodes in the tree.
    pub fn leaf_count(&self) -> usize {
        self.count_nodes_in_tree().0
    }
}
