//! Record store: bucket placement, lookup, and index maintenance.
//!
//! Records are routed to a bucket by `hash_int(id)` and written into the
//! first block of that bucket with room for them. Blocks inside a bucket are
//! always filled front to back, which is what lets `lookup` stop at the first
//! empty block. Every placed record is also indexed in two B+ trees: one keyed
//! by record id and one keyed by `hash_title(title)`, both mapping to the
//! address of the block holding the record.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::block::Block;
use crate::bucket::Bucket;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::hash::{hash_int, hash_title};
use crate::record::Record;
use crate::types::{BPlusTree, BlockPointer, Key};

/// Outcome of [`RecordStore::place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The record was written into the block at `address` and indexed.
    Placed { bucket: u32, address: BlockPointer },
    /// No block in the bucket had room; nothing was written or indexed.
    BucketFull { bucket: u32 },
}

impl Placement {
    pub fn is_placed(&self) -> bool {
        matches!(self, Placement::Placed { .. })
    }

    pub fn bucket(&self) -> u32 {
        match self {
            Placement::Placed { bucket, .. } | Placement::BucketFull { bucket } => *bucket,
        }
    }
}

/// File offsets of both persisted index roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRoots {
    pub id_root: u32,
    pub title_root: u32,
}

/// A hash-bucketed record file with its two in-memory indices.
///
/// `F` serves as both the read and the write handle of the data file.
pub struct RecordStore<F> {
    config: StoreConfig,
    file: F,
    id_index: Option<BPlusTree>,
    title_index: Option<BPlusTree>,
}

impl RecordStore<File> {
    /// Create a new data file at `path`. Fails if the file already exists.
    pub fn create_file(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::create(config, file)
    }

    /// Open an existing data file at `path`.
    pub fn open_file(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Self::open(config, file)
    }
}

impl<F: Read + Write + Seek> RecordStore<F> {
    /// Lay out every bucket's empty blocks in an empty `file`.
    pub fn create(config: StoreConfig, mut file: F) -> StoreResult<Self> {
        config.validate()?;

        for index in 0..config.bucket_count {
            Bucket::create(index, &config, &mut file).with_context("Store creation")?;
        }
        file.flush()?;

        info!(
            buckets = config.bucket_count,
            blocks_per_bucket = config.blocks_per_bucket,
            block_size = config.block_size,
            "created record store"
        );

        Ok(Self {
            config,
            file,
            id_index: None,
            title_index: None,
        })
    }

    /// Reopen a data file written with `config`'s geometry and rebuild both
    /// indices from its blocks.
    pub fn open(config: StoreConfig, mut file: F) -> StoreResult<Self> {
        config.validate()?;

        let file_len = file.seek(SeekFrom::End(0))?;
        if file_len != config.file_len() {
            return Err(StoreError::data_integrity(
                "Store geometry",
                &format!(
                    "data file is {} bytes, geometry needs {}",
                    file_len,
                    config.file_len()
                ),
            ));
        }

        let mut store = Self {
            config,
            file,
            id_index: None,
            title_index: None,
        };

        let mut records = 0usize;
        for index in 0..config.bucket_count {
            let bucket = Bucket::new(index, &config);
            for address in bucket.block_addresses() {
                let block = Block::load(address, config.block_size, &mut store.file)?;
                for record in block.records()? {
                    store.index_record(record.id, hash_title(&record.title), address)?;
                    records += 1;
                }
            }
        }

        info!(records, buckets = config.bucket_count, "opened record store");
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Index keyed by record id, or `None` before the first placement.
    pub fn id_index(&self) -> Option<&BPlusTree> {
        self.id_index.as_ref()
    }

    /// Index keyed by `hash_title(title)`, or `None` before the first placement.
    pub fn title_index(&self) -> Option<&BPlusTree> {
        self.title_index.as_ref()
    }

    /// Give back the underlying file handle.
    pub fn into_inner(self) -> F {
        self.file
    }

    /// Write `record` into the first block of its bucket with room for it.
    ///
    /// Returns `BucketFull` when no block in the bucket has room. A record too
    /// large for even an empty block is an error.
    ///
    /// Both indices are updated before the block is written. If the write
    /// then fails, the new index entries point at a block without the record,
    /// and indexed lookups miss it the same way the bucket scan does.
    pub fn place(&mut self, record: &Record) -> StoreResult<Placement> {
        let size = record.encoded_len();
        let max = Block::max_record_len(self.config.block_size);
        if size > max {
            return Err(StoreError::RecordTooLarge { size, max });
        }

        let bucket = Bucket::new(hash_int(record.id, self.config.bucket_count), &self.config);

        for address in bucket.block_addresses() {
            let mut block = Block::load(address, self.config.block_size, &mut self.file)?;
            if !block.can_fit(size) {
                continue;
            }

            self.index_record(record.id, hash_title(&record.title), address)?;
            block.write_record(record, &mut self.file)?;

            debug!(id = record.id, bucket = bucket.index, address, "placed record");
            return Ok(Placement::Placed {
                bucket: bucket.index,
                address,
            });
        }

        warn!(id = record.id, bucket = bucket.index, "bucket full, record not placed");
        Ok(Placement::BucketFull {
            bucket: bucket.index,
        })
    }

    fn index_record(&mut self, id: Key, title_key: Key, address: BlockPointer) -> StoreResult<()> {
        if let (Some(ids), Some(titles)) = (self.id_index.as_mut(), self.title_index.as_mut()) {
            ids.insert(id, address)?;
            titles.insert(title_key, address)?;
            return Ok(());
        }

        // Neither index is installed unless both could be built.
        let order = self.config.tree_order;
        let ids = BPlusTree::create(order, id, address)?;
        let titles = BPlusTree::create(order, title_key, address)?;
        self.id_index = Some(ids);
        self.title_index = Some(titles);
        Ok(())
    }

    /// Find the record with `id` by scanning its bucket.
    ///
    /// The scan stops at the first block holding no records.
    pub fn lookup(&mut self, id: i32) -> StoreResult<Option<Record>> {
        let bucket = Bucket::new(hash_int(id, self.config.bucket_count), &self.config);

        for address in bucket.block_addresses() {
            let block = Block::load(address, self.config.block_size, &mut self.file)?;
            if block.record_count() == 0 {
                return Ok(None);
            }
            if let Some(record) = block.find(id)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Find the record with `id` through the id index, loading only the
    /// blocks the index points at.
    pub fn lookup_indexed(&mut self, id: i32) -> StoreResult<Option<Record>> {
        let Some(index) = &self.id_index else {
            return Ok(None);
        };

        for address in index.find_all(id) {
            let block = Block::load(address, self.config.block_size, &mut self.file)?;
            if let Some(record) = block.find(id)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Find a record whose title is exactly `title` through the title index.
    ///
    /// Records whose titles merely share the hash are skipped.
    pub fn lookup_by_title(&mut self, title: &str) -> StoreResult<Option<Record>> {
        let Some(index) = &self.title_index else {
            return Ok(None);
        };

        let mut candidates = index.find_all(hash_title(title));
        candidates.dedup();
        for address in candidates {
            let block = Block::load(address, self.config.block_size, &mut self.file)?;
            if let Some(record) = block.records()?.into_iter().find(|r| r.title == title) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Append both indices to `out`, id index first.
    ///
    /// Returns `None` when nothing has been placed yet.
    pub fn persist_indexes<W: Write + Seek>(&self, out: &mut W) -> StoreResult<Option<IndexRoots>> {
        let (Some(ids), Some(titles)) = (&self.id_index, &self.title_index) else {
            return Ok(None);
        };

        let id_root = ids.persist(out).with_context("Id index")?;
        let title_root = titles.persist(out).with_context("Title index")?;
        out.flush()?;
        Ok(Some(IndexRoots {
            id_root,
            title_root,
        }))
    }
}
