//! Fat (universal) container detection and architecture table parsing.
//!
//! The fat header and arch table are stored big-endian. A byte-reversed magic
//! (FAT_CIGAM) flags that every subsequent table integer needs the opposite
//! reading convention; exactly one swap direction is applied per case. The
//! table is only ever read, never rewritten.

use crate::error::Result;
use crate::util::{read_u32_be, read_u32_le};

use super::constants::{FAT_CIGAM, FAT_MAGIC};
use super::file::BinaryFile;
use super::structs::{FatArch, FatHeader};

/// One architecture slice inside a fat container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceDescriptor {
    /// CPU type code of the slice
    pub cputype: u32,
    /// Byte offset of the slice within the file
    pub offset: u64,
}

/// Container layout, as classified from the leading magic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// Single-architecture image; the slice starts at offset 0.
    Thin,
    /// Multi-architecture archive with one entry per contained slice.
    Fat(Vec<SliceDescriptor>),
}

impl Container {
    /// Returns the slice offsets this container exposes, restricted to
    /// `cputype` for fat files. A thin file's single implicit slice is
    /// always returned; its CPU type is checked by the slice walker.
    pub fn slices_for(&self, cputype: u32) -> Vec<u64> {
        match self {
            Container::Thin => vec![0],
            Container::Fat(slices) => slices
                .iter()
                .filter(|s| s.cputype == cputype)
                .map(|s| s.offset)
                .collect(),
        }
    }
}

/// Classifies the file and, for fat containers, parses the arch table.
pub fn detect(file: &mut BinaryFile) -> Result<Container> {
    let magic_bytes = file.read_at(0, 4)?;
    let magic_be = read_u32_be(&magic_bytes, 0);

    if magic_be != FAT_MAGIC && magic_be != FAT_CIGAM {
        return Ok(Container::Thin);
    }
    let swapped = magic_be == FAT_CIGAM;

    let header = file.read_at(0, FatHeader::SIZE)?;
    let nfat = read_fat_u32(&header, 4, swapped);

    let mut slices = Vec::with_capacity(nfat as usize);
    for i in 0..nfat as u64 {
        let entry_offset = FatHeader::SIZE as u64 + i * FatArch::SIZE as u64;
        let entry = file.read_at(entry_offset, FatArch::SIZE)?;
        // fat_arch: cputype(4) cpusubtype(4) offset(4) size(4) align(4)
        slices.push(SliceDescriptor {
            cputype: read_fat_u32(&entry, 0, swapped),
            offset: read_fat_u32(&entry, 8, swapped) as u64,
        });
    }

    Ok(Container::Fat(slices))
}

#[inline]
fn read_fat_u32(data: &[u8], offset: usize, swapped: bool) -> u32 {
    if swapped {
        read_u32_le(data, offset)
    } else {
        read_u32_be(data, offset)
    }
}
