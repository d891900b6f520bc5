//! Load command walking for a single Mach-O slice.
//!
//! A [`CommandWalker`] is a single-pass, finite producer of load command
//! records for one slice. It is not restartable mid-slice; a fresh walk is
//! started by constructing a new walker at the slice offset.

use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::util::{read_cstr, read_u32_le};

use super::constants::{LC_LOAD_DYLIB, LC_SEGMENT_64};
use super::file::BinaryFile;
use super::structs::{LoadCommand, MachHeader64, Section64, SegmentCommand64};

/// Reads and validates the 64-bit Mach-O header at `slice_offset`.
///
/// 32-bit containers are not supported; anything without the 64-bit
/// little-endian magic is rejected.
pub fn read_slice_header(file: &mut BinaryFile, slice_offset: u64) -> Result<MachHeader64> {
    let buf = file.read_at(slice_offset, MachHeader64::SIZE)?;
    let header = MachHeader64::read_from_prefix(&buf)
        .map_err(|_| Error::NotMach64 { magic: 0 })?
        .0;
    if !header.is_valid() {
        return Err(Error::NotMach64 {
            magic: header.magic,
        });
    }
    Ok(header)
}

/// One load command, with its raw payload read eagerly.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    /// Load command type code
    pub cmd: u32,
    /// Declared size of the command, including the payload
    pub cmdsize: u32,
    /// Absolute file offset of the command start
    pub offset: u64,
    /// Full `cmdsize` bytes of the command
    data: Vec<u8>,
}

impl CommandRecord {
    /// Parses the fixed portion of a segment command, if this is one.
    pub fn segment(&self) -> Option<SegmentCommand64> {
        if self.cmd != LC_SEGMENT_64 {
            return None;
        }
        SegmentCommand64::read_from_prefix(&self.data)
            .ok()
            .map(|(seg, _)| seg)
    }

    /// Returns the section entries nested in a segment command.
    ///
    /// Sections that the declared command size cannot hold are dropped
    /// rather than treated as an error.
    pub fn sections(&self) -> Vec<Section64> {
        let Some(seg) = self.segment() else {
            return Vec::new();
        };

        let mut sections = Vec::with_capacity(seg.nsects as usize);
        let mut offset = SegmentCommand64::SIZE;
        for _ in 0..seg.nsects {
            if offset + Section64::SIZE > self.data.len() {
                break;
            }
            if let Ok((sect, _)) = Section64::read_from_prefix(&self.data[offset..]) {
                sections.push(sect);
            }
            offset += Section64::SIZE;
        }
        sections
    }

    /// Extracts the embedded dylib path of an LC_LOAD_DYLIB command.
    ///
    /// A name offset pointing outside the command, or a string without a
    /// terminator, yields `None` rather than an error.
    pub fn dylib_name(&self) -> Option<&str> {
        if self.cmd != LC_LOAD_DYLIB || self.data.len() < 12 {
            return None;
        }
        let name_offset = read_u32_le(&self.data, 8) as usize;
        read_cstr(&self.data, name_offset)
    }
}

/// Single-pass walker over one slice's load commands.
#[derive(Debug)]
pub struct CommandWalker {
    cursor: u64,
    remaining: u32,
}

impl CommandWalker {
    /// Validates the slice header and positions the walker at the first
    /// load command. Returns the header alongside the walker.
    pub fn new(file: &mut BinaryFile, slice_offset: u64) -> Result<(MachHeader64, Self)> {
        let header = read_slice_header(file, slice_offset)?;
        let walker = Self {
            cursor: slice_offset + MachHeader64::SIZE as u64,
            remaining: header.ncmds,
        };
        Ok((header, walker))
    }

    /// Produces the next load command record, or `None` once `ncmds` records
    /// have been walked.
    pub fn next_record(&mut self, file: &mut BinaryFile) -> Result<Option<CommandRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let offset = self.cursor;
        let head = file.read_at(offset, LoadCommand::SIZE)?;
        let cmd = read_u32_le(&head, 0);
        let cmdsize = read_u32_le(&head, 4);

        if (cmdsize as usize) < LoadCommand::SIZE {
            return Err(Error::malformed(
                offset,
                format!("declared size {} below minimum", cmdsize),
            ));
        }

        let data = file.read_at(offset, cmdsize as usize)?;

        self.cursor += cmdsize as u64;
        self.remaining -= 1;

        Ok(Some(CommandRecord {
            cmd,
            cmdsize,
            offset,
            data,
        }))
    }
}
