//! Utility functions for ELF parsing

use std::ops::Range;

use crate::elf::types::{ElfError, Endian, Result};

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u8(&self, offset: usize) -> Result<u8>;
    fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16>;
    fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32>;
    fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64>;
    fn read_i32(&self, offset: usize, endian: Endian) -> Result<i32>;
    fn read_i64(&self, offset: usize, endian: Endian) -> Result<i64>;
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ElfError::Truncated {
            offset: offset as u64,
            needed: N as u64,
        })
}

macro_rules! endian_read {
    ($name:ident, $ty:ty) => {
        fn $name(&self, offset: usize, endian: Endian) -> Result<$ty> {
            let bytes = read_array::<{ std::mem::size_of::<$ty>() }>(self, offset)?;
            Ok(match endian {
                Endian::Little => <$ty>::from_le_bytes(bytes),
                Endian::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

impl EndianRead for [u8] {
    fn read_u8(&self, offset: usize) -> Result<u8> {
        self.get(offset).copied().ok_or(ElfError::Truncated {
            offset: offset as u64,
            needed: 1,
        })
    }

    endian_read!(read_u16, u16);
    endian_read!(read_u32, u32);
    endian_read!(read_u64, u64);
    endian_read!(read_i32, i32);
    endian_read!(read_i64, i64);
}

/// Read a null-terminated string from data.
///
/// A string that runs to the end of `data` without a terminator is taken as-is.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_cstring(data: &[u8], offset: usize) -> Result<String> {
    let slice = data.get(offset..).ok_or(ElfError::InvalidOffset {
        offset: offset as u64,
    })?;
    let end = memchr::memchr(0, slice).unwrap_or(slice.len());
    Ok(String::from_utf8_lossy(&slice[..end]).into_owned())
}

/// Validate an `(offset, size)` pair from the file against a buffer length.
pub fn checked_range(offset: u64, size: u64, data_len: usize) -> Result<Range<usize>> {
    let end = offset
        .checked_add(size)
        .ok_or(ElfError::InvalidOffset { offset })?;
    if end > data_len as u64 {
        return Err(ElfError::Truncated {
            offset,
            needed: size,
        });
    }
    Ok(offset as usize..end as usize)
}

/// Validate a table of `count` records of `entsize` bytes starting at `offset`.
pub fn checked_table(offset: u64, entsize: u64, count: u64, data_len: usize) -> Result<Range<usize>> {
    let size = entsize
        .checked_mul(count)
        .ok_or(ElfError::InvalidOffset { offset })?;
    checked_range(offset, size, data_len)
}
