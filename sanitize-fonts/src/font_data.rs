//! raw font bytes

use std::ops::{Bound, RangeBounds};

use font_types::Scalar;
use thiserror::Error;

/// A reference to raw binary font data.
///
/// This is a wrapper around a byte slice that only hands out bytes after
/// checking that they are in bounds.
#[derive(Debug, Default, Clone, Copy)]
pub struct FontData<'a> {
    bytes: &'a [u8],
}

/// A cursor for reading and validating bytes during parsing.
///
/// Every read either consumes exactly the requested number of bytes or
/// fails and leaves the position untouched; there are no partial reads.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    pos: usize,
    data: FontData<'a>,
}

/// An error that occurs when reading font data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("An offset was out of bounds")]
    OutOfBounds,
    #[error("A length computation overflowed")]
    LengthOverflow,
}

impl<'a> FontData<'a> {
    /// Create a new `FontData` with these bytes.
    pub const fn new(bytes: &'a [u8]) -> Self {
        FontData { bytes }
    }

    /// The length of the data, in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if the data has a length of zero bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn split_off(&self, pos: usize) -> Option<FontData<'a>> {
        self.bytes.get(pos..).map(FontData::new)
    }

    pub fn slice(&self, range: impl RangeBounds<usize>) -> Option<FontData<'a>> {
        let bounds = (range.start_bound().cloned(), range.end_bound().cloned());
        self.bytes.get(bounds).map(FontData::new)
    }

    /// Return the `len` bytes starting at `offset`, if they are all in bounds.
    ///
    /// Both values usually come straight from a table directory, so the end
    /// of the range is computed with a checked add.
    pub fn slice_len(&self, offset: usize, len: usize) -> Result<FontData<'a>, ReadError> {
        let end = offset.checked_add(len).ok_or(ReadError::LengthOverflow)?;
        self.slice((Bound::Included(offset), Bound::Excluded(end)))
            .ok_or(ReadError::OutOfBounds)
    }

    pub fn read_at<T: Scalar>(&self, offset: usize) -> Result<T, ReadError> {
        let len = std::mem::size_of::<T::Raw>();
        let end = offset.checked_add(len).ok_or(ReadError::LengthOverflow)?;
        self.bytes
            .get(offset..end)
            .and_then(T::read)
            .ok_or(ReadError::OutOfBounds)
    }

    pub fn cursor(&self) -> Cursor<'a> {
        Cursor {
            pos: 0,
            data: *self,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a> Cursor<'a> {
    /// Read a big-endian scalar and advance past it.
    pub fn read<T: Scalar>(&mut self) -> Result<T, ReadError> {
        let value = self.data.read_at(self.pos)?;
        self.pos += std::mem::size_of::<T::Raw>();
        Ok(value)
    }

    /// Read `len` raw bytes and advance past them.
    pub fn read_array(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let bytes = self.data.slice_len(self.pos, len)?.as_bytes();
        self.pos += len;
        Ok(bytes)
    }

    /// Advance by `n_bytes` without looking at them.
    ///
    /// Fails, without moving, if fewer than `n_bytes` remain.
    pub fn skip(&mut self, n_bytes: usize) -> Result<(), ReadError> {
        let end = self
            .pos
            .checked_add(n_bytes)
            .ok_or(ReadError::LengthOverflow)?;
        if end > self.data.len() {
            return Err(ReadError::OutOfBounds);
        }
        self.pos = end;
        Ok(())
    }

    /// The current position, relative to the start of the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_bytes(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

impl AsRef<[u8]> for FontData<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl<'a> From<&'a [u8]> for FontData<'a> {
    fn from(src: &'a [u8]) -> FontData<'a> {
        FontData::new(src)
    }
}
