//! # Byte Reader
//!
//! Bounds-checked cursor over a frame or file byte span.
//!
//! Every read checks the remaining length first and fails with
//! [`TlmError::OutOfBounds`] instead of truncating. The integer extraction
//! itself is delegated to [`bytes::Buf`] on the checked sub-slice.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TlmError};

/// Byte order of a multi-byte field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

/// Width of an integer field in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 1 byte
    One,
    /// 2 bytes
    Two,
    /// 4 bytes
    Four,
}

impl Width {
    /// Number of bytes covered by this width
    pub const fn len(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }
}

/// Sequential reader over a borrowed byte span
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying span
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the underlying span is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes left between the cursor and the end of the span
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute position
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `pos` lies past the end of the span
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(TlmError::OutOfBounds {
                offset: pos,
                width: 0,
                len: self.buf.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Consume exactly `width` bytes
    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        if width > self.remaining() {
            return Err(TlmError::OutOfBounds {
                offset: self.pos,
                width,
                len: self.buf.len(),
            });
        }
        let chunk = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        Ok(chunk)
    }

    /// Read `n` raw bytes
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `n` bytes remain
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read an unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?.get_i8())
    }

    /// Read an unsigned 16-bit integer
    pub fn read_u16(&mut self, order: ByteOrder) -> Result<u16> {
        let mut chunk = self.take(2)?;
        Ok(match order {
            ByteOrder::Little => chunk.get_u16_le(),
            ByteOrder::Big => chunk.get_u16(),
        })
    }

    /// Read a signed 16-bit integer
    pub fn read_i16(&mut self, order: ByteOrder) -> Result<i16> {
        let mut chunk = self.take(2)?;
        Ok(match order {
            ByteOrder::Little => chunk.get_i16_le(),
            ByteOrder::Big => chunk.get_i16(),
        })
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32(&mut self, order: ByteOrder) -> Result<u32> {
        let mut chunk = self.take(4)?;
        Ok(match order {
            ByteOrder::Little => chunk.get_u32_le(),
            ByteOrder::Big => chunk.get_u32(),
        })
    }

    /// Read a signed 32-bit integer
    pub fn read_i32(&mut self, order: ByteOrder) -> Result<i32> {
        let mut chunk = self.take(4)?;
        Ok(match order {
            ByteOrder::Little => chunk.get_i32_le(),
            ByteOrder::Big => chunk.get_i32(),
        })
    }

    /// Read an integer of any supported width, widened to `i64`
    ///
    /// # Arguments
    ///
    /// * `width` - Field width (1, 2 or 4 bytes)
    /// * `order` - Byte order of the field (ignored for 1-byte fields)
    /// * `signed` - Interpret the bytes as two's complement
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the field extends past the span
    pub fn read_int(&mut self, width: Width, order: ByteOrder, signed: bool) -> Result<i64> {
        let raw = match (width, signed) {
            (Width::One, false) => i64::from(self.read_u8()?),
            (Width::One, true) => i64::from(self.read_i8()?),
            (Width::Two, false) => i64::from(self.read_u16(order)?),
            (Width::Two, true) => i64::from(self.read_i16(order)?),
            (Width::Four, false) => i64::from(self.read_u32(order)?),
            (Width::Four, true) => i64::from(self.read_i32(order)?),
        };
        Ok(raw)
    }

    /// Read an integer and convert it to a physical quantity
    ///
    /// Computes `raw * scale + offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the field extends past the span
    pub fn read_scaled(
        &mut self,
        width: Width,
        order: ByteOrder,
        signed: bool,
        scale: f64,
        offset: f64,
    ) -> Result<f64> {
        let raw = self.read_int(width, order, signed)?;
        Ok(raw as f64 * scale + offset)
    }
}
