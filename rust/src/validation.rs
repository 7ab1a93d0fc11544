//! Validation utilities for BPlusTree.
//!
//! Checks the structural invariants: key ordering and separator ranges,
//! fanout limits, parent back-references, uniform leaf depth, and a leaf chain
//! that visits every leaf in key order.

use crate::error::{StoreError, StoreResult};
use crate::types::{BPlusTree, Key, Node, NodeId};

// ============================================================================
// VALIDATION METHODS
// ============================================================================

impl BPlusTree {
    /// Check every tree invariant, reporting the first violation found.
    pub fn check_invariants(&self) -> StoreResult<()> {
        if self.node_ref(self.root)?.parent().is_some() {
            return Err(StoreError::corrupted_tree(
                "Root",
                &format!("root {} has a parent reference", self.root),
            ));
        }

        let mut leaf_depth = None;
        let mut tree_leaves = Vec::new();
        self.check_node(self.root, None, None, 0, &mut leaf_depth, &mut tree_leaves)?;

        self.check_parentless_nodes()?;
        self.check_leaf_chain(&tree_leaves)
    }

    fn check_node(
        &self,
        id: NodeId,
        lower: Option<Key>,
        upper: Option<Key>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        tree_leaves: &mut Vec<NodeId>,
    ) -> StoreResult<()> {
        let node = self.node_ref(id)?;
        let keys = node.keys();

        if keys.len() > self.max_keys() {
            return Err(StoreError::data_integrity(
                "Fanout",
                &format!("node {} holds {} keys (max {})", id, keys.len(), self.max_keys()),
            ));
        }
        if keys.is_empty() && id != self.root {
            return Err(StoreError::data_integrity(
                "Occupancy",
                &format!("non-root node {} is empty", id),
            ));
        }
        // Duplicates are permitted, so ordering is non-decreasing.
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(StoreError::data_integrity(
                "Key order",
                &format!("node {} keys out of order: {:?}", id, keys),
            ));
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if *first < lo {
                return Err(StoreError::data_integrity(
                    "Separator range",
                    &format!("node {} key {} below separator {}", id, first, lo),
                ));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if *last > hi {
                return Err(StoreError::data_integrity(
                    "Separator range",
                    &format!("node {} key {} above separator {}", id, last, hi),
                ));
            }
        }

        match node {
            Node::Leaf(_) => {
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(StoreError::data_integrity(
                            "Leaf depth",
                            &format!("leaf {} at depth {} (expected {})", id, depth, expected),
                        ));
                    }
                    Some(_) => {}
                }
                tree_leaves.push(id);
                Ok(())
            }
            Node::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1
                    || internal.children.len() > self.max_children()
                {
                    return Err(StoreError::data_integrity(
                        "Fanout",
                        &format!(
                            "node {} has {} keys and {} children",
                            id,
                            internal.keys.len(),
                            internal.children.len()
                        ),
                    ));
                }

                for (index, child) in internal.children.iter().enumerate() {
                    let child_parent = self.node_ref(*child)?.parent();
                    if child_parent != Some(id) {
                        return Err(StoreError::corrupted_tree(
                            "Parent link",
                            &format!(
                                "child {} of {} points at parent {:?}",
                                child, id, child_parent
                            ),
                        ));
                    }
                    let child_lower = if index == 0 {
                        lower
                    } else {
                        Some(internal.keys[index - 1])
                    };
                    let child_upper = internal.keys.get(index).copied().or(upper);
                    self.check_node(
                        *child,
                        child_lower,
                        child_upper,
                        depth + 1,
                        leaf_depth,
                        tree_leaves,
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Exactly one node, the root, may lack a parent.
    fn check_parentless_nodes(&self) -> StoreResult<()> {
        for id in 0..self.node_count() {
            let id = id as NodeId;
            if id != self.root && self.node_ref(id)?.parent().is_none() {
                return Err(StoreError::corrupted_tree(
                    "Root identity",
                    &format!("node {} has no parent but root is {}", id, self.root),
                ));
            }
        }
        Ok(())
    }

    /// The leaf chain must list the tree's leaves left to right and end there.
    fn check_leaf_chain(&self, tree_leaves: &[NodeId]) -> StoreResult<()> {
        let mut chain = Vec::with_capacity(tree_leaves.len());
        let mut current = self.first_leaf_id();
        while let Some(id) = current {
            if chain.len() > tree_leaves.len() {
                return Err(StoreError::corrupted_tree(
                    "Leaf chain",
                    "chain is longer than the tree (cycle?)",
                ));
            }
            chain.push(id);
            current = self.get_leaf(id).and_then(|leaf| leaf.next);
        }

        if chain != tree_leaves {
            return Err(StoreError::corrupted_tree(
                "Leaf chain",
                &format!("tree has {:?}, chain has {:?}", tree_leaves, chain),
            ));
        }

        let keys: Vec<Key> = self.keys().collect();
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(StoreError::corrupted_tree(
                "Leaf chain",
                "chain yields keys out of order",
            ));
        }
        if keys.len() != self.len() {
            return Err(StoreError::corrupted_tree(
                "Leaf chain",
                &format!("chain yields {} keys but tree has {}", keys.len(), self.len()),
            ));
        }

        Ok(())
    }
}
