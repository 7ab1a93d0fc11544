//! On-disk tree layout: serializer and loader.
//!
//! Each node is written as one fixed-size disk node record. For order `m`:
//!
//! ```text
//! +-----------------------------+
//! | is_leaf        u8           |
//! | key_count      i32          |
//! | keys           i32 x 2m     |
//! | refs           u32 x 2m+1   |
//! | parent_offset  u32          |
//! +-----------------------------+
//! ```
//!
//! All integers are little endian and unused slots hold [`NO_REF`] (keys: 0).
//! Internal nodes store child file offsets in `refs[0..=key_count]`; leaves
//! store their entries' block pointers in `refs[0..key_count]` and leave the
//! terminal slot empty. The root's parent offset is `NO_REF`.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::arena::NodeArena;
use crate::construction::validate_order;
use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::types::{BPlusTree, InternalNode, Key, LeafNode, Node, NodeId};

/// Null file offset / empty reference slot.
pub const NO_REF: u32 = u32::MAX;

/// Trees deeper than this cannot come from a valid file (fanout is at least 2
/// and node ids are 32-bit), so the loader treats it as a reference cycle.
const MAX_LOAD_DEPTH: usize = 64;

/// Persisted form of one tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskNode {
    pub is_leaf: bool,
    pub key_count: i32,
    /// Exactly `2m` keys; slots past `key_count` are zero.
    pub keys: Vec<Key>,
    /// Exactly `2m + 1` references.
    pub refs: Vec<u32>,
    pub parent_offset: u32,
}

impl DiskNode {
    /// Size in bytes of one disk node for a tree of `order`, that is
    /// `13 + 16m`. Saturates instead of overflowing for absurd orders.
    pub fn encoded_len(order: usize) -> usize {
        order.saturating_mul(16).saturating_add(13)
    }

    /// Disk form of an in-memory node. Internal child refs start out as
    /// `NO_REF`; the serializer fills them once the children are written.
    pub(crate) fn from_node(node: &Node, order: usize, parent_offset: u32) -> Self {
        let mut keys = vec![0; 2 * order];
        let mut refs = vec![NO_REF; 2 * order + 1];
        let node_keys = node.keys();
        keys[..node_keys.len()].copy_from_slice(node_keys);

        if let Node::Leaf(leaf) = node {
            refs[..leaf.blocks.len()].copy_from_slice(&leaf.blocks);
        }

        Self {
            is_leaf: node.is_leaf(),
            key_count: node_keys.len() as i32,
            keys,
            refs,
            parent_offset,
        }
    }

    /// Serialize to the fixed-size record.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 4 * (self.keys.len() + self.refs.len() + 2));
        buf.push(u8::from(self.is_leaf));
        buf.extend_from_slice(&self.key_count.to_le_bytes());
        for key in &self.keys {
            buf.extend_from_slice(&key.to_le_bytes());
        }
        for r in &self.refs {
            buf.extend_from_slice(&r.to_le_bytes());
        }
        buf.extend_from_slice(&self.parent_offset.to_le_bytes());
        buf
    }

    /// Deserialize a record written for a tree of `order`.
    pub fn decode(bytes: &[u8], order: usize) -> StoreResult<Self> {
        let expected = Self::encoded_len(order);
        if bytes.len() != expected {
            return Err(StoreError::corrupted_tree(
                "Disk node",
                &format!("record is {} bytes, expected {}", bytes.len(), expected),
            ));
        }

        let is_leaf = match bytes[0] {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::corrupted_tree(
                    "Disk node",
                    &format!("invalid leaf flag {}", other),
                ))
            }
        };

        let word = |i: usize| -> [u8; 4] {
            let start = 1 + 4 * i;
            [bytes[start], bytes[start + 1], bytes[start + 2], bytes[start + 3]]
        };

        let key_count = i32::from_le_bytes(word(0));
        let max_keys = 2 * order;
        let keys: Vec<Key> = (0..max_keys).map(|i| i32::from_le_bytes(word(1 + i))).collect();
        let refs: Vec<u32> = (0..=max_keys)
            .map(|i| u32::from_le_bytes(word(1 + max_keys + i)))
            .collect();
        let parent_offset = u32::from_le_bytes(word(1 + max_keys + max_keys + 1));

        if key_count < 0 || key_count as usize > max_keys {
            return Err(StoreError::corrupted_tree(
                "Disk node",
                &format!("key count {} outside 0..={}", key_count, max_keys),
            ));
        }
        if !is_leaf {
            if key_count == 0 {
                return Err(StoreError::corrupted_tree(
                    "Disk node",
                    "internal node without separators",
                ));
            }
            if refs[..=key_count as usize].contains(&NO_REF) {
                return Err(StoreError::corrupted_tree(
                    "Disk node",
                    "internal node with unresolved child reference",
                ));
            }
        }

        Ok(Self {
            is_leaf,
            key_count,
            keys,
            refs,
            parent_offset,
        })
    }
}

// ============================================================================
// SERIALIZER
// ============================================================================

impl BPlusTree {
    /// Append the whole tree to `out` and return the root's file offset.
    pub fn persist<W: Write + Seek>(&self, out: &mut W) -> StoreResult<u32> {
        let root_offset = self.persist_node(self.root, NO_REF, out)?;
        tracing::info!(
            root_offset,
            nodes = self.node_count(),
            entries = self.len(),
            "persisted tree"
        );
        Ok(root_offset)
    }

    /// Append `id` and its subtree at the end of `out`, returning `id`'s offset.
    ///
    /// The node's record is reserved first; an internal node is rewritten in
    /// place once every child has reported its own offset.
    pub fn persist_node<W: Write + Seek>(
        &self,
        id: NodeId,
        parent_offset: u32,
        out: &mut W,
    ) -> StoreResult<u32> {
        let node = self.node_ref(id)?;
        let mut disk = DiskNode::from_node(node, self.order, parent_offset);

        let end = out.seek(SeekFrom::End(0))?;
        let offset = u32::try_from(end)
            .ok()
            .filter(|offset| *offset != NO_REF)
            .ok_or_else(|| {
                StoreError::allocation_error("disk node", "index file exceeds 32-bit offsets")
            })?;
        out.write_all(&disk.encode())?;

        if let Node::Internal(internal) = node {
            for (slot, child) in internal.children.iter().enumerate() {
                disk.refs[slot] = self.persist_node(*child, offset, out)?;
            }
            out.seek(SeekFrom::Start(u64::from(offset)))?;
            out.write_all(&disk.encode())?;
        }

        Ok(offset)
    }

    // ========================================================================
    // LOADER
    // ========================================================================

    /// Rebuild a tree of `order` from the disk node at `root_offset`.
    ///
    /// Parent references are restored from the traversal, the leaf chain is
    /// rebuilt left to right, and the result is validated before returning.
    pub fn load<R: Read + Seek>(order: usize, input: &mut R, root_offset: u32) -> StoreResult<Self> {
        validate_order(order)?;

        let mut tree = Self {
            order,
            root: 0,
            nodes: NodeArena::new(),
        };
        let mut leaves = Vec::new();
        tree.root = tree.load_node(input, root_offset, None, NO_REF, 0, &mut leaves)?;

        for pair in leaves.windows(2) {
            tree.leaf_mut(pair[0])?.next = Some(pair[1]);
        }

        tree.check_invariants().with_context("Loaded tree")?;
        tracing::info!(root_offset, nodes = tree.node_count(), "loaded tree");
        Ok(tree)
    }

    fn load_node<R: Read + Seek>(
        &mut self,
        input: &mut R,
        offset: u32,
        parent: Option<NodeId>,
        parent_offset: u32,
        depth: usize,
        leaves: &mut Vec<NodeId>,
    ) -> StoreResult<NodeId> {
        if depth > MAX_LOAD_DEPTH {
            return Err(StoreError::corrupted_tree(
                "Disk node",
                &format!("tree deeper than {} levels at offset {}", MAX_LOAD_DEPTH, offset),
            ));
        }

        let disk = read_disk_node(input, offset, self.order)?;
        if disk.parent_offset != parent_offset {
            return Err(StoreError::corrupted_tree(
                "Disk node",
                &format!(
                    "node at {} names parent {} but was reached from {}",
                    offset, disk.parent_offset, parent_offset
                ),
            ));
        }

        let key_count = disk.key_count as usize;
        let capacity = 2 * self.order;

        if disk.is_leaf {
            let mut leaf = LeafNode::new(capacity);
            leaf.keys.extend_from_slice(&disk.keys[..key_count]);
            leaf.blocks.extend_from_slice(&disk.refs[..key_count]);
            leaf.parent = parent;
            let id = self.allocate_node(Node::Leaf(leaf))?;
            leaves.push(id);
            return Ok(id);
        }

        let mut internal = InternalNode::new(capacity);
        internal.keys.extend_from_slice(&disk.keys[..key_count]);
        internal.parent = parent;
        let id = self.allocate_node(Node::Internal(internal))?;

        for &child_offset in &disk.refs[..=key_count] {
            let child = self.load_node(input, child_offset, Some(id), offset, depth + 1, leaves)?;
            self.internal_mut(id)?.children.push(child);
        }

        Ok(id)
    }
}

fn read_disk_node<R: Read + Seek>(input: &mut R, offset: u32, order: usize) -> StoreResult<DiskNode> {
    let mut buf = vec![0u8; DiskNode::encoded_len(order)];
    input.seek(SeekFrom::Start(u64::from(offset)))?;
    input.read_exact(&mut buf)?;
    DiskNode::decode(&buf, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tree_with(order: usize, keys: impl IntoIterator<Item = i32>) -> BPlusTree {
        let mut keys = keys.into_iter();
        let first = keys.next().unwrap();
        let mut tree = BPlusTree::create(order, first, first as u32 * 8).unwrap();
        for k in keys {
            tree.insert(k, k as u32 * 8).unwrap();
        }
        tree
    }

    fn decode_at(bytes: &[u8], offset: u32, order: usize) -> DiskNode {
        let start = offset as usize;
        DiskNode::decode(&bytes[start..start + DiskNode::encoded_len(order)], order).unwrap()
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(DiskNode::encoded_len(1), 29);
        assert_eq!(DiskNode::encoded_len(2), 45);
    }

    #[test]
    fn test_oversized_order_fails_cleanly() {
        assert_eq!(DiskNode::encoded_len(usize::MAX / 4), usize::MAX);
        assert!(DiskNode::decode(&[0u8; 29], usize::MAX / 4).is_err());

        let tree = BPlusTree::create(1, 7, 4096).unwrap();
        let mut out = Cursor::new(Vec::new());
        let root = tree.persist(&mut out).unwrap();
        let err = BPlusTree::load(usize::MAX / 4, &mut out, root).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOrder(_)));
    }

    #[test]
    fn test_persist_single_leaf() {
        let tree = BPlusTree::create(1, 7, 4096).unwrap();
        let mut out = Cursor::new(Vec::new());
        let root = tree.persist(&mut out).unwrap();
        assert_eq!(root, 0);

        let bytes = out.into_inner();
        assert_eq!(bytes.len(), DiskNode::encoded_len(1));

        let node = decode_at(&bytes, 0, 1);
        assert!(node.is_leaf);
        assert_eq!(node.key_count, 1);
        assert_eq!(node.keys, vec![7, 0]);
        assert_eq!(node.refs, vec![4096, NO_REF, NO_REF]);
        assert_eq!(node.parent_offset, NO_REF);
    }

    #[test]
    fn test_persist_resolves_child_offsets() {
        let tree = tree_with(1, [10, 20, 30]);
        let mut out = Cursor::new(Vec::new());
        let root_offset = tree.persist(&mut out).unwrap();
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 3 * DiskNode::encoded_len(1));

        let root = decode_at(&bytes, root_offset, 1);
        assert!(!root.is_leaf);
        assert_eq!(root.key_count, 1);
        assert_eq!(root.keys[0], 20);

        let left = decode_at(&bytes, root.refs[0], 1);
        let right = decode_at(&bytes, root.refs[1], 1);
        assert_eq!(&left.keys[..1], &[10]);
        assert_eq!(&right.keys[..2], &[20, 30]);
        assert_eq!(left.parent_offset, root_offset);
        assert_eq!(right.parent_offset, root_offset);
    }

    #[test]
    fn test_no_unresolved_refs_in_deep_tree() {
        let order = 1;
        let tree = tree_with(order, 0..200);
        let mut out = Cursor::new(Vec::new());
        let root_offset = tree.persist(&mut out).unwrap();
        let bytes = out.into_inner();

        let mut pending = vec![root_offset];
        let mut visited = 0;
        while let Some(offset) = pending.pop() {
            let node = decode_at(&bytes, offset, order);
            visited += 1;
            if !node.is_leaf {
                let children = &node.refs[..=node.key_count as usize];
                assert!(!children.contains(&NO_REF));
                pending.extend_from_slice(children);
            }
        }
        assert_eq!(visited, tree.node_count());
    }

    #[test]
    fn test_persist_appends_after_existing_data() {
        let tree = tree_with(2, [1, 2, 3, 4, 5]);
        let mut out = Cursor::new(vec![0xAB; 10]);
        let root_offset = tree.persist(&mut out).unwrap();
        assert_eq!(root_offset, 10);

        let loaded = BPlusTree::load(2, &mut out, root_offset).unwrap();
        assert_eq!(loaded.entries().collect::<Vec<_>>(), tree.entries().collect::<Vec<_>>());
    }

    #[test]
    fn test_load_round_trip() {
        let tree = tree_with(2, (0..300).map(|i| (i * 7919) % 1000));
        let mut out = Cursor::new(Vec::new());
        let root_offset = tree.persist(&mut out).unwrap();

        let loaded = BPlusTree::load(2, &mut out, root_offset).unwrap();
        assert_eq!(loaded.entries().collect::<Vec<_>>(), tree.entries().collect::<Vec<_>>());
        assert_eq!(loaded.height(), tree.height());
        assert_eq!(loaded.node_count(), tree.node_count());
        assert!(loaded.check_invariants().is_ok());
    }

    #[test]
    fn test_loaded_tree_accepts_inserts() {
        let tree = tree_with(1, 0..20);
        let mut out = Cursor::new(Vec::new());
        let root_offset = tree.persist(&mut out).unwrap();

        let mut loaded = BPlusTree::load(1, &mut out, root_offset).unwrap();
        loaded.insert(100, 1).unwrap();
        loaded.insert(-5, 2).unwrap();
        assert!(loaded.check_invariants().is_ok());
        assert_eq!(loaded.len(), 22);
    }

    #[test]
    fn test_decode_rejects_bad_records() {
        let mut bytes = DiskNode::from_node(
            &Node::Leaf(LeafNode::new(2)),
            1,
            NO_REF,
        )
        .encode();
        bytes[0] = 7;
        assert!(DiskNode::decode(&bytes, 1).is_err());

        bytes[0] = 1;
        bytes[1..5].copy_from_slice(&5i32.to_le_bytes());
        assert!(DiskNode::decode(&bytes, 1).is_err());

        assert!(DiskNode::decode(&bytes[..10], 1).is_err());
    }

    #[test]
    fn test_load_rejects_wrong_parent_offset() {
        let tree = tree_with(1, [10, 20, 30]);
        let mut out = Cursor::new(Vec::new());
        let root_offset = tree.persist(&mut out).unwrap();

        // A child loaded as if it were the root names a parent it was not reached from.
        let root = {
            let bytes = out.get_ref();
            decode_at(bytes, root_offset, 1)
        };
        let err = BPlusTree::load(1, &mut out, root.refs[0]).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_load_past_end_is_io_error() {
        let mut out = Cursor::new(Vec::new());
        let err = BPlusTree::load(1, &mut out, 0).unwrap_err();
        assert!(err.is_io_error());
    }
}
