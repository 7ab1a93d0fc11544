//! Hash buckets: fixed runs of consecutive blocks in the data file.

use std::io::{Seek, SeekFrom, Write};

use crate::block::Block;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::BlockPointer;

/// Location of one bucket. Block `n` of bucket `b` lives at
/// `(b * blocks_per_bucket + n) * block_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub index: u32,
    pub first_address: BlockPointer,
    pub block_count: u32,
    pub block_size: u32,
}

impl Bucket {
    /// Bucket `index` of a store with `config`'s geometry.
    ///
    /// The config must have passed `validate()`, which keeps every address
    /// inside the block pointer range.
    pub fn new(index: u32, config: &StoreConfig) -> Self {
        let first = u64::from(index) * config.bucket_len();
        Self {
            index,
            first_address: first as BlockPointer,
            block_count: config.blocks_per_bucket,
            block_size: config.block_size,
        }
    }

    /// Append bucket `index`'s empty blocks to the end of `writer`.
    ///
    /// Buckets must be created in index order, so the file must currently
    /// end exactly where this bucket starts.
    pub fn create<W: Write + Seek>(
        index: u32,
        config: &StoreConfig,
        writer: &mut W,
    ) -> StoreResult<Self> {
        let bucket = Self::new(index, config);
        let end = writer.seek(SeekFrom::End(0))?;
        if end != u64::from(bucket.first_address) {
            return Err(StoreError::data_integrity(
                "Bucket layout",
                &format!(
                    "bucket {} starts at {} but the file ends at {}",
                    index, bucket.first_address, end
                ),
            ));
        }

        for address in bucket.block_addresses() {
            Block::empty(address, bucket.block_size)?.flush(writer)?;
        }
        Ok(bucket)
    }

    /// Block addresses in ascending order.
    pub fn block_addresses(&self) -> impl Iterator<Item = BlockPointer> {
        let first = self.first_address;
        let size = self.block_size;
        (0..self.block_count).map(move |n| first + n * size)
    }
}
