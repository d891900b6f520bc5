//! Byte-buffer read primitives.
//!
//! All structural parsing goes through owned buffers returned by
//! [`crate::macho::BinaryFile::read_at`]; these helpers read scalar fields
//! out of those buffers. Thin-slice integers are little-endian, fat-table
//! integers big-endian (see `crate::macho::fat` for the swapped case).

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Reads a little-endian u32 from a byte slice at the given offset.
///
/// # Panics
///
/// Panics if `offset + 4 > data.len()`.
#[inline(always)]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&data[offset..])
}

/// Reads a little-endian u64 from a byte slice at the given offset.
///
/// # Panics
///
/// Panics if `offset + 8 > data.len()`.
#[inline(always)]
pub fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    LittleEndian::read_u64(&data[offset..])
}

/// Reads a big-endian u32 from a byte slice at the given offset.
///
/// # Panics
///
/// Panics if `offset + 4 > data.len()`.
#[inline(always)]
pub fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&data[offset..])
}

/// Returns the NUL-terminated string starting at `offset`, or `None` if the
/// offset is out of bounds or no terminator exists before the end of `data`.
pub fn read_cstr(data: &[u8], offset: usize) -> Option<&str> {
    if offset >= data.len() {
        return None;
    }
    let tail = &data[offset..];
    let end = memchr::memchr(0, tail)?;
    std::str::from_utf8(&tail[..end]).ok()
}
