// Typed big-endian encoder/decoder over a fixed-size byte buffer.
//
// A page is exactly one block in size. All multi-byte values are stored
// big-endian; byte slices carry a 4-byte big-endian length prefix, and
// strings are UTF-8 byte slices validated on read.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{DbError, Result};

pub(crate) const I32_SIZE: usize = std::mem::size_of::<i32>();

pub struct Page {
    buf: Vec<u8>,
}

impl Page {
    /// A zeroed page of `block_size` bytes.
    pub fn new(block_size: usize) -> Self {
        Self {
            buf: vec![0; block_size],
        }
    }

    /// A page over an existing byte buffer (log records are decoded this way).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { buf: bytes }
    }

    /// Worst-case bytes needed to store a string of `len` codepoints:
    /// the length prefix plus four bytes per codepoint.
    pub const fn max_length(len: usize) -> usize {
        I32_SIZE + len * 4
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn contents(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub(crate) fn fill_zero(&mut self) {
        self.buf.fill(0);
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if offset.checked_add(len).map_or(true, |end| end > self.buf.len()) {
            return Err(DbError::PageOverflow {
                offset,
                len,
                size: self.buf.len(),
            });
        }
        Ok(&self.buf[offset..offset + len])
    }

    fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        if offset.checked_add(len).map_or(true, |end| end > self.buf.len()) {
            return Err(DbError::PageOverflow {
                offset,
                len,
                size: self.buf.len(),
            });
        }
        Ok(&mut self.buf[offset..offset + len])
    }

    pub fn get_int(&self, offset: usize) -> Result<i32> {
        let bytes = self.slice(offset, 4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn set_int(&mut self, offset: usize, val: i32) -> Result<()> {
        self.slice_mut(offset, 4)?.copy_from_slice(&val.to_be_bytes());
        Ok(())
    }

    pub fn get_short(&self, offset: usize) -> Result<i16> {
        let bytes = self.slice(offset, 2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn set_short(&mut self, offset: usize, val: i16) -> Result<()> {
        self.slice_mut(offset, 2)?.copy_from_slice(&val.to_be_bytes());
        Ok(())
    }

    pub fn get_long(&self, offset: usize) -> Result<i64> {
        let bytes = self.slice(offset, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn set_long(&mut self, offset: usize, val: i64) -> Result<()> {
        self.slice_mut(offset, 8)?.copy_from_slice(&val.to_be_bytes());
        Ok(())
    }

    pub fn get_bool(&self, offset: usize) -> Result<bool> {
        Ok(self.slice(offset, 1)?[0] != 0)
    }

    pub fn set_bool(&mut self, offset: usize, val: bool) -> Result<()> {
        self.slice_mut(offset, 1)?[0] = u8::from(val);
        Ok(())
    }

    /// Dates are stored as 64-bit unix seconds; sub-second precision is lost.
    pub fn get_date(&self, offset: usize) -> Result<DateTime<Utc>> {
        let secs = self.get_long(offset)?;
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or(DbError::InvalidDate(secs))
    }

    pub fn set_date(&mut self, offset: usize, val: &DateTime<Utc>) -> Result<()> {
        self.set_long(offset, val.timestamp())
    }

    pub fn get_bytes(&self, offset: usize) -> Result<&[u8]> {
        let len = self.get_int(offset)?;
        if len < 0 {
            return Err(DbError::PageOverflow {
                offset,
                len: 0,
                size: self.buf.len(),
            });
        }
        self.slice(offset + I32_SIZE, len as usize)
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.set_int(offset, bytes.len() as i32)?;
        self.slice_mut(offset + I32_SIZE, bytes.len())?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> Result<String> {
        let bytes = self.get_bytes(offset)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub fn set_string(&mut self, offset: usize, val: &str) -> Result<()> {
        self.set_bytes(offset, val.as_bytes())
    }
}
