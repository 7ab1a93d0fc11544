//! Core types and data structures for the B+ tree indices.
//!
//! This module contains the fundamental data structures, type definitions,
//! and constants shared by the index engine and the placement engine.

use crate::arena::NodeArena;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Minimum order `m` for any tree (at most `2m` keys per node).
pub const MIN_ORDER: usize = 1;

/// Maximum order `m`. Keeps `2m` key counts within `i32` and a disk node
/// around one megabyte.
pub const MAX_ORDER: usize = 1 << 16;

// ============================================================================
// TYPE DEFINITIONS
// ============================================================================

/// Index key: a raw record id or a hash derived from a title.
pub type Key = i32;

/// Byte offset in the data file of the block holding a record.
pub type BlockPointer = u32;

/// Node ID type for arena-based allocation
pub type NodeId = u32;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// B+ tree index mapping keys to block pointers.
///
/// Nodes live in a dense arena and refer to each other by [`NodeId`]. Every
/// non-root node records its parent; leaves are chained left to right through
/// `next` so a full ordered scan never touches an internal node.
///
/// Duplicate keys are kept. An equal key is placed after the entries already
/// stored under it, so a leaf-chain scan returns duplicates in insertion order.
///
/// # Examples
///
/// ```
/// use bucketdb::BPlusTree;
///
/// let mut tree = BPlusTree::create(1, 10, 0).unwrap();
/// tree.insert(20, 4096).unwrap();
/// tree.insert(30, 8192).unwrap();
///
/// assert_eq!(tree.get(20), Some(4096));
/// let keys: Vec<_> = tree.keys().collect();
/// assert_eq!(keys, [10, 20, 30]);
/// ```
#[derive(Debug)]
pub struct BPlusTree {
    /// Order `m`: nodes hold at most `2m` keys and `2m + 1` children.
    pub(crate) order: usize,
    /// The root node of the tree.
    pub(crate) root: NodeId,
    /// Arena storage for every node reachable from `root`.
    pub(crate) nodes: NodeArena<Node>,
}

/// Leaf node holding `(key, block pointer)` entries in ascending key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    /// Maximum number of keys this node can hold (`2m`).
    pub(crate) capacity: usize,
    /// Sorted list of keys.
    pub(crate) keys: Vec<Key>,
    /// Block pointers corresponding to keys.
    pub(crate) blocks: Vec<BlockPointer>,
    /// Next leaf in the chain (for ordered scans).
    pub(crate) next: Option<NodeId>,
    /// Parent node; `None` only for the root.
    pub(crate) parent: Option<NodeId>,
}

/// Internal node holding separator keys and child references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// Maximum number of keys this node can hold (`2m`).
    pub(crate) capacity: usize,
    /// Sorted list of separator keys.
    pub(crate) keys: Vec<Key>,
    /// Child nodes; always `keys.len() + 1` of them.
    pub(crate) children: Vec<NodeId>,
    /// Parent node; `None` only for the root.
    pub(crate) parent: Option<NodeId>,
}

/// A tree node: either an internal node or a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Returns true if this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Keys stored in this node.
    pub fn keys(&self) -> &[Key] {
        match self {
            Node::Internal(internal) => &internal.keys,
            Node::Leaf(leaf) => &leaf.keys,
        }
    }

    /// Parent of this node, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Internal(internal) => internal.parent,
            Node::Leaf(leaf) => leaf.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Internal(internal) => internal.parent = parent,
            Node::Leaf(leaf) => leaf.parent = parent,
        }
    }

    /// Children of an internal node; empty for a leaf.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Internal(internal) => &internal.children,
            Node::Leaf(_) => &[],
        }
    }

    /// Number of keys in this node.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns true if this node holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

/// A leaf split: the new right sibling and the key promoted into the parent.
#[derive(Debug)]
pub(crate) struct LeafSplit {
    pub(crate) right: LeafNode,
    pub(crate) separator: Key,
}

/// An internal split: the new right sibling and the key moved up to the parent.
#[derive(Debug)]
pub(crate) struct InternalSplit {
    pub(crate) right: InternalNode,
    pub(crate) promoted: Key,
}
