use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// Byte order of a container, as reported by its header parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn from_little(little_endian: bool) -> Self {
        if little_endian {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }
}

impl From<Endianness> for binrw::Endian {
    fn from(value: Endianness) -> Self {
        match value {
            Endianness::Little => binrw::Endian::Little,
            Endianness::Big => binrw::Endian::Big,
        }
    }
}

/// Identity of a [`ByteWindow`]. Clones share it, sub-windows do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

impl WindowId {
    fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An immutable view over part of an in-memory blob.
///
/// `offset` is where the view starts inside the blob, which is also the file
/// offset reported for anything found in the window when the blob is a whole
/// container.
#[derive(Debug, Clone)]
pub struct ByteWindow {
    id: WindowId,
    blob: Bytes,
    offset: u64,
    len: u64,
    order: Endianness,
}

impl ByteWindow {
    /// Wrap a whole blob.
    pub fn new(blob: impl Into<Bytes>, order: Endianness) -> Self {
        let blob = blob.into();
        let len = blob.len() as u64;
        Self {
            id: WindowId::next(),
            blob,
            offset: 0,
            len,
            order,
        }
    }

    /// View `len` bytes of `blob` starting at `offset`.
    pub fn over(blob: &Bytes, offset: u64, len: u64, order: Endianness) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| DecodeError::bounds(offset, len, blob.len() as u64))?;
        if end > blob.len() as u64 {
            return Err(DecodeError::bounds(offset, len, blob.len() as u64));
        }
        Ok(Self {
            id: WindowId::next(),
            blob: blob.clone(),
            offset,
            len,
            order,
        })
    }

    /// A sub-window relative to this one. It keeps the byte order.
    pub fn sub_window(&self, start: u64, len: u64) -> Result<Self> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| DecodeError::bounds(start, len, self.len))?;
        if end > self.len {
            return Err(DecodeError::bounds(start, len, self.len));
        }
        Self::over(&self.blob, self.offset + start, len, self.order)
    }

    #[inline]
    pub fn id(&self) -> WindowId {
        self.id
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn order(&self) -> Endianness {
        self.order
    }

    /// The bytes covered by this window.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.blob[self.offset as usize..(self.offset + self.len) as usize]
    }

    /// A cheap owned copy of `[start, start + len)` inside the window.
    pub fn slice(&self, start: u64, len: u64) -> Result<Bytes> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| DecodeError::bounds(start, len, self.len))?;
        if end > self.len {
            return Err(DecodeError::bounds(start, len, self.len));
        }
        let base = self.offset as usize;
        Ok(self.blob.slice(base + start as usize..base + end as usize))
    }
}
