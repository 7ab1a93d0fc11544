//! Hash-bucketed record store with B+ tree indices.
//!
//! Records live in a single data file divided into hash buckets of
//! fixed-size slotted blocks. A record's id picks its bucket; the record is
//! written into the first block of the bucket with room for it. Two
//! arena-backed B+ trees index every placed record by id and by a hash of its
//! title, mapping each key to the address of the block that holds it. Either
//! tree can be persisted to a flat file of fixed-size disk nodes and loaded
//! back.
//!
//! ```
//! use std::io::Cursor;
//! use bucketdb::{Record, RecordStore, StoreConfig};
//!
//! let config = StoreConfig {
//!     bucket_count: 16,
//!     blocks_per_bucket: 2,
//!     block_size: 512,
//!     tree_order: 2,
//! };
//! let mut store = RecordStore::create(config, Cursor::new(Vec::new())).unwrap();
//!
//! let record = Record {
//!     id: 7,
//!     title: "Sorting and Searching".to_string(),
//!     ..Record::default()
//! };
//! assert!(store.place(&record).unwrap().is_placed());
//! assert_eq!(store.lookup(7).unwrap(), Some(record));
//! ```

mod arena;
mod block;
mod bucket;
mod config;
mod construction;
mod error;
mod hash;
mod insert_operations;
mod iteration;
mod node;
mod persist;
mod record;
mod store;
mod tree_structure;
mod types;
mod validation;

pub use arena::NodeArena;
pub use block::{Block, BlockHeader, BLOCK_HEADER_SIZE, SLOT_SIZE};
pub use bucket::Bucket;
pub use config::{ConfigError, StoreConfig};
pub use construction::{cut, validate_order};
pub use error::{StoreError, StoreResult, StoreResultExt};
pub use hash::{hash_int, hash_title};
pub use iteration::{EntryIterator, KeyIterator, LeafIterator};
pub use persist::{DiskNode, NO_REF};
pub use record::Record;
pub use store::{IndexRoots, Placement, RecordStore};
pub use types::{BPlusTree, BlockPointer, InternalNode, Key, LeafNode, Node, NodeId, MAX_ORDER, MIN_ORDER};
