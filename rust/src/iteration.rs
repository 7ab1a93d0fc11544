//! Iterator implementations for BPlusTree.
//!
//! All iterators walk the leaf chain from the leftmost leaf, so a full scan
//! never revisits internal nodes.

use crate::types::{BPlusTree, BlockPointer, Key, LeafNode, NodeId};

// ============================================================================
// ITERATOR STRUCTS
// ============================================================================

/// Iterator over `(key, block pointer)` entries in key order.
pub struct EntryIterator<'a> {
    tree: &'a BPlusTree,
    current_leaf_ref: Option<&'a LeafNode>,
    current_leaf_index: usize,
}

/// Iterator over keys in order.
pub struct KeyIterator<'a> {
    entries: EntryIterator<'a>,
}

/// Iterator over leaf node IDs in chain order.
pub struct LeafIterator<'a> {
    tree: &'a BPlusTree,
    next_leaf_id: Option<NodeId>,
}

// ============================================================================
// BPLUSTREE ITERATOR METHODS
// ============================================================================

impl BPlusTree {
    /// Returns an iterator over all entries in sorted key order.
    pub fn entries(&self) -> EntryIterator<'_> {
        EntryIterator::new(self)
    }

    /// Returns an iterator over all keys in sorted order.
    pub fn keys(&self) -> KeyIterator<'_> {
        KeyIterator {
            entries: self.entries(),
        }
    }

    /// Returns an iterator over leaf IDs following the leaf chain.
    pub fn leaves(&self) -> LeafIterator<'_> {
        LeafIterator {
            tree: self,
            next_leaf_id: self.first_leaf_id(),
        }
    }
}

// ============================================================================
// ENTRYITERATOR IMPLEMENTATION
// ============================================================================

impl<'a> EntryIterator<'a> {
    pub fn new(tree: &'a BPlusTree) -> Self {
        let current_leaf_ref = tree.first_leaf_id().and_then(|id| tree.get_leaf(id));

        Self {
            tree,
            current_leaf_ref,
            current_leaf_index: 0,
        }
    }
}

impl Iterator for EntryIterator<'_> {
    type Item = (Key, BlockPointer);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.current_leaf_ref?;

            if self.current_leaf_index < leaf.keys.len() {
                let index = self.current_leaf_index;
                self.current_leaf_index += 1;
                return Some((leaf.keys[index], leaf.blocks[index]));
            }

            // Move to the next leaf
            self.current_leaf_ref = leaf.next.and_then(|id| self.tree.get_leaf(id));
            self.current_leaf_index = 0;
        }
    }
}

impl Iterator for KeyIterator<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(key, _)| key)
    }
}

impl Iterator for LeafIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next_leaf_id?;
        self.next_leaf_id = self.tree.get_leaf(id).and_then(|leaf| leaf.next);
        Some(id)
    }
}
