//! Dense arena for tree nodes.
//!
//! Nodes are never freed (the index has no deletion path), so the arena is an
//! append-only `Vec<T>` addressed by `NodeId`. Allocation is fallible: running
//! out of ids or memory is reported instead of aborting.

use crate::error::{StoreError, TreeResult};
use crate::types::{BPlusTree, InternalNode, LeafNode, Node, NodeId};

/// Append-only arena allocator.
#[derive(Debug)]
pub struct NodeArena<T> {
    storage: Vec<T>,
}

impl<T> NodeArena<T> {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self {
            storage: Vec::new(),
        }
    }

    /// Allocate a new item in the arena and return its ID
    #[inline]
    pub fn allocate(&mut self, item: T) -> TreeResult<NodeId> {
        let index = self.storage.len();
        let id = NodeId::try_from(index)
            .map_err(|_| StoreError::allocation_error("node", "arena id space exhausted"))?;
        self.storage
            .try_reserve(1)
            .map_err(|e| StoreError::allocation_error("node", &e.to_string()))?;
        self.storage.push(item);
        Ok(id)
    }

    /// Get a reference to an item in the arena
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        let index = usize::try_from(id).ok()?;
        self.storage.get(index)
    }

    /// Get a mutable reference to an item in the arena
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let index = usize::try_from(id).ok()?;
        self.storage.get_mut(index)
    }

    /// Get the number of allocated items
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BPLUSTREE ARENA ACCESS HELPERS
// ============================================================================

impl BPlusTree {
    /// Allocate a node in the arena and return its ID.
    #[inline]
    pub(crate) fn allocate_node(&mut self, node: Node) -> TreeResult<NodeId> {
        self.nodes.allocate(node)
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> TreeResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| StoreError::corrupted_tree("Arena", &format!("missing node {}", id)))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::corrupted_tree("Arena", &format!("missing node {}", id)))
    }

    /// Get a leaf node by ID, or `None` if the ID is not a leaf.
    pub fn get_leaf(&self, id: NodeId) -> Option<&LeafNode> {
        match self.nodes.get(id) {
            Some(Node::Leaf(leaf)) => Some(leaf),
            _ => None,
        }
    }

    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> TreeResult<&mut LeafNode> {
        match self.nodes.get_mut(id) {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            _ => Err(StoreError::corrupted_tree(
                "Arena",
                &format!("node {} is not a leaf", id),
            )),
        }
    }

    /// Get an internal node by ID, or `None` if the ID is not internal.
    pub fn get_internal(&self, id: NodeId) -> Option<&InternalNode> {
        match self.nodes.get(id) {
            Some(Node::Internal(internal)) => Some(internal),
            _ => None,
        }
    }

    pub(crate) fn internal_mut(&mut self, id: NodeId) -> TreeResult<&mut InternalNode> {
        match self.nodes.get_mut(id) {
            Some(Node::Internal(internal)) => Ok(internal),
            _ => Err(StoreError::corrupted_tree(
                "Arena",
                &format!("node {} is not internal", id),
            )),
        }
    }
}
