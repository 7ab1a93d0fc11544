//! Fixed-size slotted blocks of the data file.
//!
//! Block layout:
//! ```text
//! +--------------------+
//! | Block Header (12)  |
//! +--------------------+
//! | Slot Array         |  <- Grows upward
//! | (4 bytes/slot)     |
//! +--------------------+
//! |                    |
//! | Free Space         |
//! |                    |
//! +--------------------+
//! | Record Data        |  <- Grows downward from the block end
//! +--------------------+
//! ```
//!
//! Each slot holds the block-relative offset of one encoded [`Record`].

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::types::BlockPointer;

/// Size of the block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 12;

/// Per-record slot overhead in bytes.
pub const SLOT_SIZE: usize = 4;

/// Block header.
///
/// Layout (12 bytes, little endian):
/// - record_count: 4 bytes
/// - free_start: 4 bytes (end of slot array)
/// - free_end: 4 bytes (start of record data)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub record_count: u32,
    pub free_start: u32,
    pub free_end: u32,
}

impl BlockHeader {
    /// Header of an empty block of `block_size` bytes.
    pub fn new(block_size: u32) -> Self {
        Self {
            record_count: 0,
            free_start: BLOCK_HEADER_SIZE as u32,
            free_end: block_size,
        }
    }

    /// Bytes between the slot array and the record data.
    pub fn free_space(&self) -> usize {
        self.free_end.saturating_sub(self.free_start) as usize
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.record_count.to_le_bytes());
        buf[4..8].copy_from_slice(&self.free_start.to_le_bytes());
        buf[8..12].copy_from_slice(&self.free_end.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self {
            record_count: word(0),
            free_start: word(4),
            free_end: word(8),
        }
    }
}

/// An in-memory copy of one block, tagged with its file address.
#[derive(Debug, Clone)]
pub struct Block {
    address: BlockPointer,
    data: Vec<u8>,
}

impl Block {
    /// A fresh empty block for `address`.
    pub fn empty(address: BlockPointer, block_size: u32) -> StoreResult<Self> {
        check_block_size(address, block_size)?;
        let mut data = vec![0u8; block_size as usize];
        data[..BLOCK_HEADER_SIZE].copy_from_slice(&BlockHeader::new(block_size).to_bytes());
        Ok(Self { address, data })
    }

    /// Read the block at `address` from `reader`.
    ///
    /// Fails with `InvalidAddress` when the address is not a multiple of
    /// `block_size` or the block extends past the end of the file, and with
    /// `CorruptedBlock` when `block_size` cannot hold a header or the header
    /// or slot array is inconsistent.
    pub fn load<R: Read + Seek>(
        address: BlockPointer,
        block_size: u32,
        reader: &mut R,
    ) -> StoreResult<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        let start = u64::from(address);
        let end = start + u64::from(block_size);
        if block_size == 0 || start % u64::from(block_size) != 0 || end > file_len {
            return Err(StoreError::InvalidAddress {
                address: start,
                file_len,
            });
        }
        check_block_size(address, block_size)?;

        let mut data = vec![0u8; block_size as usize];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut data)?;

        let block = Self { address, data };
        block.validate()?;
        Ok(block)
    }

    fn validate(&self) -> StoreResult<()> {
        let header = self.header();
        let slots_end = (header.record_count as usize)
            .checked_mul(SLOT_SIZE)
            .and_then(|n| n.checked_add(BLOCK_HEADER_SIZE));

        if slots_end != Some(header.free_start as usize) {
            return Err(self.corrupted(&format!(
                "{} records but slot array ends at {}",
                header.record_count, header.free_start
            )));
        }
        if header.free_start > header.free_end || header.free_end as usize > self.data.len() {
            return Err(self.corrupted(&format!(
                "free range {}..{} outside block of {} bytes",
                header.free_start,
                header.free_end,
                self.data.len()
            )));
        }
        for slot in 0..header.record_count as usize {
            let offset = self.slot(slot) as usize;
            if offset < header.free_end as usize || offset >= self.data.len() {
                return Err(self.corrupted(&format!(
                    "slot {} points at {} outside record area",
                    slot, offset
                )));
            }
        }
        Ok(())
    }

    /// File address of this block.
    pub fn address(&self) -> BlockPointer {
        self.address
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader::from_bytes(&self.data[..BLOCK_HEADER_SIZE])
    }

    fn set_header(&mut self, header: BlockHeader) {
        self.data[..BLOCK_HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    pub fn record_count(&self) -> u32 {
        self.header().record_count
    }

    pub fn free_space(&self) -> usize {
        self.header().free_space()
    }

    /// Largest record an empty block of `block_size` can hold.
    pub fn max_record_len(block_size: u32) -> usize {
        (block_size as usize).saturating_sub(BLOCK_HEADER_SIZE + SLOT_SIZE)
    }

    /// Whether a record of `encoded_len` bytes plus its slot fits.
    pub fn can_fit(&self, encoded_len: usize) -> bool {
        self.free_space() >= encoded_len + SLOT_SIZE
    }

    /// Raw block contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn slot(&self, index: usize) -> u32 {
        let at = BLOCK_HEADER_SIZE + index * SLOT_SIZE;
        u32::from_le_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    /// Add `record` to this block and write the whole block back to its
    /// address in `writer`.
    pub fn write_record<W: Write + Seek>(&mut self, record: &Record, writer: &mut W) -> StoreResult<()> {
        let bytes = record.encode()?;
        if !self.can_fit(bytes.len()) {
            return Err(StoreError::RecordTooLarge {
                size: bytes.len() + SLOT_SIZE,
                max: self.free_space(),
            });
        }

        let mut header = self.header();
        header.free_end -= bytes.len() as u32;
        let offset = header.free_end as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);

        let slot_at = header.free_start as usize;
        self.data[slot_at..slot_at + SLOT_SIZE].copy_from_slice(&header.free_end.to_le_bytes());
        header.free_start += SLOT_SIZE as u32;
        header.record_count += 1;
        self.set_header(header);

        self.flush(writer)
    }

    /// Write the block's current contents at its address.
    pub fn flush<W: Write + Seek>(&self, writer: &mut W) -> StoreResult<()> {
        writer.seek(SeekFrom::Start(u64::from(self.address)))?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Decode every record in slot order.
    pub fn records(&self) -> StoreResult<Vec<Record>> {
        (0..self.record_count() as usize)
            .map(|slot| self.record_at(slot))
            .collect()
    }

    /// First record in slot order whose id is `id`.
    pub fn find(&self, id: i32) -> StoreResult<Option<Record>> {
        for slot in 0..self.record_count() as usize {
            let record = self.record_at(slot)?;
            if record.id == id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn record_at(&self, slot: usize) -> StoreResult<Record> {
        let offset = self.slot(slot) as usize;
        let bytes = self.data.get(offset..).ok_or_else(|| {
            self.corrupted(&format!("slot {} points past the block", slot))
        })?;
        Record::decode(bytes).map(|(record, _)| record)
    }

    fn corrupted(&self, details: &str) -> StoreError {
        StoreError::corrupted_block(u64::from(self.address), details)
    }
}

fn check_block_size(address: BlockPointer, block_size: u32) -> StoreResult<()> {
    if (block_size as usize) < BLOCK_HEADER_SIZE {
        return Err(StoreError::corrupted_block(
            u64::from(address),
            &format!(
                "block size {} cannot hold the {}-byte header",
                block_size, BLOCK_HEADER_SIZE
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BLOCK_SIZE: u32 = 256;

    fn record(id: i32, title: &str) -> Record {
        Record {
            id,
            title: title.to_string(),
            year: 1999,
            authors: "Knuth D".to_string(),
            citations: id * 3,
            updated_at: "2016-10-26".to_string(),
            snippet: String::new(),
        }
    }

    fn file_with_blocks(n: u32) -> Cursor<Vec<u8>> {
        let mut file = Cursor::new(Vec::new());
        for i in 0..n {
            Block::empty(i * BLOCK_SIZE, BLOCK_SIZE)
                .unwrap()
                .flush(&mut file)
                .unwrap();
        }
        file
    }

    #[test]
    fn test_empty_block() {
        let block = Block::empty(0, BLOCK_SIZE).unwrap();
        assert_eq!(block.record_count(), 0);
        assert_eq!(block.free_space(), BLOCK_SIZE as usize - BLOCK_HEADER_SIZE);
        assert_eq!(block.as_bytes().len(), BLOCK_SIZE as usize);
        assert!(block.records().unwrap().is_empty());
    }

    #[test]
    fn test_header_roundtrip() {
        let header = BlockHeader {
            record_count: 3,
            free_start: 24,
            free_end: 100,
        };
        assert_eq!(BlockHeader::from_bytes(&header.to_bytes()), header);
        assert_eq!(header.free_space(), 76);
    }

    #[test]
    fn test_write_record_updates_space_and_file() {
        let mut file = file_with_blocks(2);
        let mut block = Block::load(BLOCK_SIZE, BLOCK_SIZE, &mut file).unwrap();
        let r = record(7, "Sorting and Searching");
        let before = block.free_space();

        block.write_record(&r, &mut file).unwrap();
        assert_eq!(block.record_count(), 1);
        assert_eq!(block.free_space(), before - r.encoded_len() - SLOT_SIZE);

        let reloaded = Block::load(BLOCK_SIZE, BLOCK_SIZE, &mut file).unwrap();
        assert_eq!(reloaded.records().unwrap(), vec![r.clone()]);
        assert_eq!(reloaded.find(7).unwrap(), Some(r));
        assert_eq!(reloaded.find(8).unwrap(), None);

        // The neighbouring block is untouched.
        let first = Block::load(0, BLOCK_SIZE, &mut file).unwrap();
        assert_eq!(first.record_count(), 0);
    }

    #[test]
    fn test_records_keep_slot_order() {
        let mut file = file_with_blocks(1);
        let mut block = Block::load(0, BLOCK_SIZE, &mut file).unwrap();
        for id in [3, 1, 2] {
            block.write_record(&record(id, "t"), &mut file).unwrap();
        }
        let ids: Vec<i32> = block.records().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_fills_until_no_room() {
        let mut file = file_with_blocks(1);
        let mut block = Block::load(0, BLOCK_SIZE, &mut file).unwrap();
        let r = record(1, "a title of moderate length");
        let mut written = 0;
        while block.can_fit(r.encoded_len()) {
            block.write_record(&r, &mut file).unwrap();
            written += 1;
        }
        assert!(written > 1);
        assert!(block.free_space() < r.encoded_len() + SLOT_SIZE);
        assert!(matches!(
            block.write_record(&r, &mut file),
            Err(StoreError::RecordTooLarge { .. })
        ));
        assert_eq!(block.record_count(), written);
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let mut file = file_with_blocks(1);
        let mut block = Block::load(0, BLOCK_SIZE, &mut file).unwrap();
        let padding = Block::max_record_len(BLOCK_SIZE) - Record::MIN_ENCODED_LEN;
        let r = Record {
            id: 1,
            snippet: "p".repeat(padding),
            ..Record::default()
        };
        assert!(block.can_fit(r.encoded_len()));
        block.write_record(&r, &mut file).unwrap();
        assert_eq!(block.free_space(), 0);
    }

    #[test]
    fn test_load_rejects_bad_addresses() {
        let mut file = file_with_blocks(2);
        assert!(matches!(
            Block::load(10, BLOCK_SIZE, &mut file),
            Err(StoreError::InvalidAddress { address: 10, .. })
        ));
        assert!(matches!(
            Block::load(2 * BLOCK_SIZE, BLOCK_SIZE, &mut file),
            Err(StoreError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_block_smaller_than_header_is_rejected() {
        for size in [1u32, 4, BLOCK_HEADER_SIZE as u32 - 1] {
            assert!(Block::empty(0, size).unwrap_err().is_corruption());

            let mut file = Cursor::new(vec![0u8; 64]);
            let err = Block::load(size, size, &mut file).unwrap_err();
            assert!(err.is_corruption());
        }
        assert!(Block::empty(0, BLOCK_HEADER_SIZE as u32).is_ok());
    }

    #[test]
    fn test_load_rejects_corrupted_header() {
        let mut file = file_with_blocks(1);
        file.get_mut()[0..4].copy_from_slice(&9u32.to_le_bytes());
        let err = Block::load(0, BLOCK_SIZE, &mut file).unwrap_err();
        assert!(err.is_corruption());

        let mut zeroed = Cursor::new(vec![0u8; BLOCK_SIZE as usize]);
        assert!(Block::load(0, BLOCK_SIZE, &mut zeroed).is_err());
    }
}
