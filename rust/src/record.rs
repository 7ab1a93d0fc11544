//! Article records and their binary encoding.

use crate::error::{StoreError, StoreResult};

/// One article stored in the data file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub id: i32,
    pub title: String,
    pub year: i32,
    pub authors: String,
    pub citations: i32,
    pub updated_at: String,
    pub snippet: String,
}

impl Record {
    /// Encoded size of a record whose strings are all empty.
    pub const MIN_ENCODED_LEN: usize = 4 + 3 * 4 + 4 * 2;

    /// Exact number of bytes `encode` produces.
    pub fn encoded_len(&self) -> usize {
        Self::MIN_ENCODED_LEN
            + self.title.len()
            + self.authors.len()
            + self.updated_at.len()
            + self.snippet.len()
    }

    /// Serialize as `total_len`, the three integers, then each string
    /// prefixed by its `u16` length. All integers are little endian.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let total = self.encoded_len();
        let total_len = u32::try_from(total).map_err(|_| StoreError::RecordTooLarge {
            size: total,
            max: u32::MAX as usize,
        })?;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&total_len.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.year.to_le_bytes());
        buf.extend_from_slice(&self.citations.to_le_bytes());
        for field in self.string_fields() {
            put_string(&mut buf, field)?;
        }
        Ok(buf)
    }

    /// Decode one record from the start of `bytes`, returning it together
    /// with the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> StoreResult<(Self, usize)> {
        let mut reader = FieldReader { bytes, pos: 0 };

        let total = reader.u32()? as usize;
        if total < Self::MIN_ENCODED_LEN || total > bytes.len() {
            return Err(StoreError::corrupted_record(&format!(
                "length {} outside {}..={}",
                total,
                Self::MIN_ENCODED_LEN,
                bytes.len()
            )));
        }
        reader.bytes = &bytes[..total];

        let record = Record {
            id: reader.i32()?,
            year: reader.i32()?,
            citations: reader.i32()?,
            title: reader.string()?,
            authors: reader.string()?,
            updated_at: reader.string()?,
            snippet: reader.string()?,
        };

        if reader.pos != total {
            return Err(StoreError::corrupted_record(&format!(
                "{} trailing bytes after record {}",
                total - reader.pos,
                record.id
            )));
        }
        Ok((record, total))
    }

    fn string_fields(&self) -> [&str; 4] {
        [&self.title, &self.authors, &self.updated_at, &self.snippet]
    }
}

fn put_string(buf: &mut Vec<u8>, value: &str) -> StoreResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| StoreError::RecordTooLarge {
        size: value.len(),
        max: u16::MAX as usize,
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn take(&mut self, n: usize) -> StoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                StoreError::corrupted_record(&format!(
                    "field of {} bytes at {} runs past end ({})",
                    n,
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let bytes = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> StoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> StoreResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self) -> StoreResult<String> {
        let b = self.take(2)?;
        let len = u16::from_le_bytes([b[0], b[1]]) as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| StoreError::corrupted_record(&format!("invalid UTF-8: {}", e)))
    }
}
