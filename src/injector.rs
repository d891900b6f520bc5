//! LC_LOAD_DYLIB injection.
//!
//! Splices a new load command referencing an auxiliary dylib into the gap
//! between the last existing load command and the first section's file data,
//! then bumps `ncmds`/`sizeofcmds`. Re-running against an already-injected
//! binary is a no-op.

use std::path::Path;

use zerocopy::IntoBytes;

use tracing::{debug, info};

use crate::config::Arch;
use crate::error::{Error, Result};
use crate::macho::structs::{Dylib, DylibCommand, MachHeader64};
use crate::macho::{detect, BinaryFile, CommandWalker, Container};

/// Result of injecting into one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    /// A new load command was written.
    Injected,
    /// A load command with the exact same path already exists; nothing was
    /// written.
    AlreadyPresent,
}

/// Injects a load command for `dylib_path` into the binary at `path`.
///
/// For a fat file only slices whose architecture is in `archs` are touched
/// (the auxiliary dylib is typically built for a single architecture); a thin
/// file's single slice is always targeted. Idempotent: slices that already
/// reference the path are skipped.
pub fn inject_dylib(path: impl AsRef<Path>, dylib_path: &str, archs: &[Arch]) -> Result<()> {
    let mut file = BinaryFile::open(path)?;

    match detect(&mut file)? {
        Container::Fat(slices) => {
            let wanted: Vec<u32> = archs.iter().map(|a| a.cputype()).collect();
            for slice in slices.iter().filter(|s| wanted.contains(&s.cputype)) {
                inject_slice(&mut file, slice.offset, dylib_path)?;
            }
        }
        Container::Thin => {
            inject_slice(&mut file, 0, dylib_path)?;
        }
    }

    Ok(())
}

/// Injects into the slice at `slice_offset`.
///
/// Capacity is checked before any byte is written, so a failed attempt
/// leaves the file unchanged. On success both header fields are written
/// before the call returns.
pub fn inject_slice(
    file: &mut BinaryFile,
    slice_offset: u64,
    dylib_path: &str,
) -> Result<InjectOutcome> {
    let (header, mut walker) = CommandWalker::new(file, slice_offset)?;

    // One walk: look for an existing reference and track the lowest section
    // file offset, the boundary new commands must not cross.
    let mut min_section_offset: Option<u64> = None;
    while let Some(record) = walker.next_record(file)? {
        if record.dylib_name() == Some(dylib_path) {
            info!(
                "dylib already injected at slice offset {:#x}, skipping",
                slice_offset
            );
            return Ok(InjectOutcome::AlreadyPresent);
        }
        for sect in record.sections() {
            if sect.offset > 0 {
                let offset = sect.offset as u64;
                min_section_offset =
                    Some(min_section_offset.map_or(offset, |m| m.min(offset)));
            }
        }
    }

    // Section file offsets are relative to the slice start, as is the end of
    // the load command region.
    let end_of_cmds = MachHeader64::SIZE as u64 + header.sizeofcmds as u64;
    let available = match min_section_offset {
        Some(min) => min as i64 - end_of_cmds as i64,
        None => 0,
    };

    let command = build_load_dylib_command(dylib_path);
    debug!(
        "slice {:#x}: end of commands {:#x}, available {} bytes, required {}",
        slice_offset,
        end_of_cmds,
        available,
        command.len()
    );
    if (command.len() as i64) > available {
        return Err(Error::NoCommandSpace {
            available,
            required: command.len(),
        });
    }

    file.write_at(slice_offset + end_of_cmds, &command)?;

    // Bump ncmds and sizeofcmds together in a single write so the header is
    // never observed half-updated within this run.
    let mut counters = [0u8; 8];
    counters[..4].copy_from_slice(&(header.ncmds + 1).to_le_bytes());
    counters[4..].copy_from_slice(&(header.sizeofcmds + command.len() as u32).to_le_bytes());
    file.write_at(slice_offset + MachHeader64::NCMDS_OFFSET, &counters)?;

    info!(
        "LC_LOAD_DYLIB injected at slice offset {:#x} ({} bytes)",
        slice_offset,
        command.len()
    );
    Ok(InjectOutcome::Injected)
}

/// Builds the raw bytes of an LC_LOAD_DYLIB command for `path`.
///
/// The command is the 24-byte fixed portion, the NUL-terminated path, and
/// zero padding up to the next multiple of 8. Timestamp and version fields
/// are zeroed.
pub fn build_load_dylib_command(path: &str) -> Vec<u8> {
    let path_len = path.len() + 1; // NUL terminator
    let raw_size = DylibCommand::SIZE + path_len;
    let cmdsize = (raw_size + 7) & !7;

    let command = DylibCommand {
        cmd: crate::macho::constants::LC_LOAD_DYLIB,
        cmdsize: cmdsize as u32,
        dylib: Dylib {
            name_offset: DylibCommand::SIZE as u32,
            timestamp: 0,
            current_version: 0,
            compatibility_version: 0,
        },
    };

    let mut data = Vec::with_capacity(cmdsize);
    data.extend_from_slice(command.as_bytes());
    data.extend_from_slice(path.as_bytes());
    data.resize(cmdsize, 0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::constants::{
        CPU_TYPE_ARM64, CPU_TYPE_X86_64, FAT_MAGIC, LC_LOAD_DYLIB,
    };
    use crate::macho::structs::{Section64, SegmentCommand64};

    const DYLIB_PATH: &str = "@executable_path/TweakPlugin.dylib";

    fn write_temp(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    /// A thin slice whose single segment holds one section with file data at
    /// `section_offset`, leaving that much room for load commands.
    fn thin_fixture(cputype: u32, section_offset: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x2000];

        let mut seg = SegmentCommand64::default();
        seg.set_name("__TEXT");
        seg.cmdsize = (SegmentCommand64::SIZE + Section64::SIZE) as u32;
        seg.vmaddr = 0x1_0000_0000;
        seg.vmsize = 0x1000;
        seg.filesize = 0x1000;
        seg.nsects = 1;

        let sect = Section64 {
            offset: section_offset,
            ..Default::default()
        };

        let header = MachHeader64 {
            cputype,
            ncmds: 1,
            sizeofcmds: seg.cmdsize,
            ..Default::default()
        };

        data[..MachHeader64::SIZE].copy_from_slice(header.as_bytes());
        let mut cursor = MachHeader64::SIZE;
        for chunk in [seg.as_bytes(), sect.as_bytes()] {
            data[cursor..cursor + chunk.len()].copy_from_slice(chunk);
            cursor += chunk.len();
        }
        data
    }

    fn read_header(path: &std::path::Path) -> MachHeader64 {
        let mut f = BinaryFile::open(path).unwrap();
        crate::macho::read_slice_header(&mut f, 0).unwrap()
    }

    #[test]
    fn test_build_command_layout() {
        let cmd = build_load_dylib_command(DYLIB_PATH);
        assert_eq!(cmd.len() % 8, 0);
        assert_eq!(cmd.len(), (DylibCommand::SIZE + DYLIB_PATH.len() + 1 + 7) & !7);
        assert_eq!(u32::from_le_bytes(cmd[..4].try_into().unwrap()), LC_LOAD_DYLIB);
        assert_eq!(
            u32::from_le_bytes(cmd[4..8].try_into().unwrap()),
            cmd.len() as u32
        );
        assert_eq!(u32::from_le_bytes(cmd[8..12].try_into().unwrap()), 24);
        let name = &cmd[24..24 + DYLIB_PATH.len()];
        assert_eq!(name, DYLIB_PATH.as_bytes());
        assert_eq!(cmd[24 + DYLIB_PATH.len()], 0);
    }

    #[test]
    fn test_inject_updates_header() {
        let (_dir, path) = write_temp(&thin_fixture(CPU_TYPE_ARM64, 0x800));
        let before = read_header(&path);

        inject_dylib(&path, DYLIB_PATH, &[Arch::Arm64]).unwrap();

        let command_size = build_load_dylib_command(DYLIB_PATH).len() as u32;
        let after = read_header(&path);
        assert_eq!(after.ncmds, before.ncmds + 1);
        assert_eq!(after.sizeofcmds, before.sizeofcmds + command_size);

        // The new record is walkable and carries the path.
        let mut f = BinaryFile::open(&path).unwrap();
        let (_, mut walker) = CommandWalker::new(&mut f, 0).unwrap();
        let mut names = Vec::new();
        while let Some(record) = walker.next_record(&mut f).unwrap() {
            if let Some(name) = record.dylib_name() {
                assert_eq!(record.cmdsize % 8, 0);
                names.push(name.to_string());
            }
        }
        assert_eq!(names, vec![DYLIB_PATH.to_string()]);
    }

    #[test]
    fn test_inject_is_idempotent() {
        let (_dir, path) = write_temp(&thin_fixture(CPU_TYPE_ARM64, 0x800));

        inject_dylib(&path, DYLIB_PATH, &[Arch::Arm64]).unwrap();
        let first = std::fs::read(&path).unwrap();

        let mut f = BinaryFile::open(&path).unwrap();
        let outcome = inject_slice(&mut f, 0, DYLIB_PATH).unwrap();
        drop(f);
        assert_eq!(outcome, InjectOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_inject_no_space() {
        // Section data begins 8 bytes after the load commands end; far too
        // small for the new command.
        let end_of_cmds = (MachHeader64::SIZE + SegmentCommand64::SIZE + Section64::SIZE) as u32;
        let (_dir, path) = write_temp(&thin_fixture(CPU_TYPE_ARM64, end_of_cmds + 8));
        let before = std::fs::read(&path).unwrap();

        let err = inject_dylib(&path, DYLIB_PATH, &[Arch::Arm64]).unwrap_err();
        assert!(matches!(
            err,
            Error::NoCommandSpace { available: 8, .. }
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_inject_no_sections_means_no_space() {
        // Segment with zero sections: no observable boundary, so no room.
        let mut data = vec![0u8; 0x2000];
        let seg = SegmentCommand64 {
            vmaddr: 0x1_0000_0000,
            vmsize: 0x1000,
            filesize: 0x1000,
            ..Default::default()
        };
        let header = MachHeader64 {
            cputype: CPU_TYPE_ARM64,
            ncmds: 1,
            sizeofcmds: seg.cmdsize,
            ..Default::default()
        };
        data[..MachHeader64::SIZE].copy_from_slice(header.as_bytes());
        data[MachHeader64::SIZE..MachHeader64::SIZE + SegmentCommand64::SIZE]
            .copy_from_slice(seg.as_bytes());
        let (_dir, path) = write_temp(&data);

        assert!(matches!(
            inject_dylib(&path, DYLIB_PATH, &[Arch::Arm64]),
            Err(Error::NoCommandSpace { available: 0, .. })
        ));
    }

    #[test]
    fn test_fat_inject_targets_matching_arch_only() {
        let mut data = vec![0u8; 0xA000];
        data[..4].copy_from_slice(&FAT_MAGIC.to_be_bytes());
        data[4..8].copy_from_slice(&2u32.to_be_bytes());
        let mut offset = 8;
        for (cpu, slice_off) in [(CPU_TYPE_ARM64, 0x4000u32), (CPU_TYPE_X86_64, 0x8000u32)] {
            data[offset..offset + 4].copy_from_slice(&cpu.to_be_bytes());
            data[offset + 8..offset + 12].copy_from_slice(&slice_off.to_be_bytes());
            data[offset + 12..offset + 16].copy_from_slice(&0x2000u32.to_be_bytes());
            offset += 20;
        }
        for (cpu, slice_off) in [(CPU_TYPE_ARM64, 0x4000usize), (CPU_TYPE_X86_64, 0x8000)] {
            let slice = thin_fixture(cpu, 0x800);
            data[slice_off..slice_off + slice.len()].copy_from_slice(&slice);
        }
        let (_dir, path) = write_temp(&data);
        let before = std::fs::read(&path).unwrap();

        inject_dylib(&path, DYLIB_PATH, &[Arch::Arm64]).unwrap();

        let after = std::fs::read(&path).unwrap();
        let mut f = BinaryFile::open(&path).unwrap();
        let arm = crate::macho::read_slice_header(&mut f, 0x4000).unwrap();
        assert_eq!(arm.ncmds, 2);
        // x86_64 slice untouched
        assert_eq!(after[0x8000..], before[0x8000..]);
    }
}
