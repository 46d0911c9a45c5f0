//! Byte-order aware reads over a borrowed byte slice.

use core::mem::size_of;

use chrono::{DateTime, Utc};
use zerocopy::{
    byteorder::{BigEndian, LittleEndian, I16, I32, I64},
    FromBytes,
};

use crate::{errors::*, layout::*};

/// Byte order of the multi-byte fields in an image.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

/// Typed, bounds-checked view over a byte slice with a declared byte order.
///
/// The view never mutates its source. Offsets passed to the read functions are relative
/// to the start of the slice; errors report them relative to `origin`, which is the
/// position of the slice in the file it was read from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ByteOrderView<'a> {
    bytes:      &'a [u8],
    endianness: Endianness,
    origin:     u64,
}

impl<'a> ByteOrderView<'a> {
    pub fn new(bytes: &'a [u8], endianness: Endianness) -> Self {
        Self {
            bytes,
            endianness,
            origin: 0,
        }
    }

    /// Set the file position of the first byte of the view, used for error reporting.
    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = origin;
        self
    }

    pub fn endianness(&self) -> Endianness { self.endianness }

    pub fn origin(&self) -> u64 { self.origin }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Returns the raw bytes in `offset..offset + length`, unmodified.
    pub fn bytes(&self, offset: usize, length: usize) -> Result<&'a [u8], ViewError> {
        offset
            .checked_add(length)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| self.error(offset, length))
    }

    /// Returns a view over `offset..offset + length` with the same byte order.
    pub fn subview(&self, offset: usize, length: usize) -> Result<ByteOrderView<'a>, ViewError> {
        let bytes = self.bytes(offset, length)?;
        Ok(ByteOrderView {
            bytes,
            endianness: self.endianness,
            origin: self.origin + offset as u64,
        })
    }

    /// Returns the raw bytes of a layout field.
    pub fn field_bytes(&self, span: FieldSpan) -> Result<&'a [u8], ViewError> {
        self.bytes(span.offset, span.width.size())
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8, ViewError> { self.read::<i8>(offset) }

    pub fn read_i16(&self, offset: usize) -> Result<i16, ViewError> {
        Ok(match self.endianness {
            Endianness::Big => self.read::<I16<BigEndian>>(offset)?.get(),
            Endianness::Little => self.read::<I16<LittleEndian>>(offset)?.get(),
        })
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32, ViewError> {
        Ok(match self.endianness {
            Endianness::Big => self.read::<I32<BigEndian>>(offset)?.get(),
            Endianness::Little => self.read::<I32<LittleEndian>>(offset)?.get(),
        })
    }

    pub fn read_i64(&self, offset: usize) -> Result<i64, ViewError> {
        Ok(match self.endianness {
            Endianness::Big => self.read::<I64<BigEndian>>(offset)?.get(),
            Endianness::Little => self.read::<I64<LittleEndian>>(offset)?.get(),
        })
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, ViewError> {
        let value = self.read_i8(offset)?;
        if value >= 0 {
            return Ok(value as u8);
        }
        Ok(self.widen(offset, 1)? as u8)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, ViewError> {
        let value = self.read_i16(offset)?;
        if value >= 0 {
            return Ok(value as u16);
        }
        Ok(self.widen(offset, 2)? as u16)
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, ViewError> {
        let value = self.read_i32(offset)?;
        if value >= 0 {
            return Ok(value as u32);
        }
        Ok(self.widen(offset, 4)? as u32)
    }

    pub fn read_u64(&self, offset: usize) -> Result<u64, ViewError> {
        let value = self.read_i64(offset)?;
        if value >= 0 {
            return Ok(value as u64);
        }
        Ok(self.widen(offset, 8)? as u64)
    }

    /// Read an unsigned value of the width declared by a layout field.
    pub fn read_unsigned(&self, span: FieldSpan) -> Result<u64, ViewError> {
        Ok(match span.width {
            Width::Byte => self.read_u8(span.offset)?.into(),
            Width::Word => self.read_u16(span.offset)?.into(),
            Width::Dword => self.read_u32(span.offset)?.into(),
            Width::Qword => self.read_u64(span.offset)?,
        })
    }

    /// Read an unsigned 32-bit count of seconds since the unix epoch as a UTC date-time.
    ///
    /// The format doesn't specify a time zone, UTC is assumed.
    pub fn read_timestamp(&self, offset: usize) -> Result<DateTime<Utc>, ViewError> {
        let seconds = self.read_u32(offset)?;
        Ok(DateTime::<Utc>::from_timestamp(i64::from(seconds), 0).unwrap_or_default())
    }

    /// Rebuild the unsigned bit pattern of `width` bytes at `offset` in a wider container.
    fn widen(&self, offset: usize, width: usize) -> Result<u128, ViewError> {
        let bytes = self.bytes(offset, width)?;
        Ok(bytes.iter().enumerate().fold(0u128, |sum, (index, &byte)| {
            let position = match self.endianness {
                Endianness::Big => width - 1 - index,
                Endianness::Little => index,
            };
            sum + ((u128::from(byte) & 0xff) << (8 * position))
        }))
    }

    fn read<T: FromBytes>(&self, offset: usize) -> Result<T, ViewError> {
        let bytes = self.bytes(offset, size_of::<T>())?;
        T::read_from_prefix(bytes)
            .map(|(value, _)| value)
            .map_err(|_| self.error(offset, size_of::<T>()))
    }

    fn error(&self, offset: usize, length: usize) -> ViewError {
        ViewError {
            offset: self.origin + offset as u64,
            length,
            available: self.bytes.len(),
        }
    }
}
