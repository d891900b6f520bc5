//! In-place instruction patching at virtual addresses.

use std::path::Path;

use tracing::{debug, info};

use crate::config::{PatchEntry, VersionTarget};
use crate::error::{Error, Result};
use crate::macho::{detect, BinaryFile, CommandWalker, Container};

/// Applies every entry of `target` to the binary at `path`, in place.
///
/// For a fat file each entry is applied independently to every slice of its
/// architecture; slices of other architectures are left untouched. A run that
/// applies zero patches across the whole file fails with
/// [`Error::NoArchMatched`] rather than silently doing nothing.
pub fn patch_binary(path: impl AsRef<Path>, target: &VersionTarget) -> Result<()> {
    let entries: Vec<&PatchEntry> = target.entries().collect();
    if entries.is_empty() {
        return Err(Error::NoArchMatched);
    }

    let mut file = BinaryFile::open(path)?;
    let mut patched = 0usize;

    match detect(&mut file)? {
        Container::Fat(slices) => {
            debug!("fat container with {} slices", slices.len());
            for slice in &slices {
                for entry in entries
                    .iter()
                    .filter(|e| e.arch.cputype() == slice.cputype)
                {
                    patch_slice(&mut file, slice.offset, entry)?;
                    patched += 1;
                }
            }
        }
        Container::Thin => {
            let header = crate::macho::read_slice_header(&mut file, 0)?;
            let matching: Vec<_> = entries
                .iter()
                .filter(|e| e.arch.cputype() == header.cputype)
                .collect();
            if matching.is_empty() {
                return Err(Error::NoArchMatched);
            }
            for entry in matching {
                patch_slice(&mut file, 0, entry)?;
                patched += 1;
            }
        }
    }

    if patched == 0 {
        return Err(Error::NoArchMatched);
    }
    Ok(())
}

/// Patches one entry within the slice at `slice_offset`.
///
/// Walks the slice's segments and writes the replacement bytes into the first
/// segment whose VM range contains the target address (segments of a
/// well-formed binary do not overlap). Fails with [`Error::VaNotFound`] if no
/// segment contains it.
pub fn patch_slice(file: &mut BinaryFile, slice_offset: u64, entry: &PatchEntry) -> Result<()> {
    let (_, mut walker) = CommandWalker::new(file, slice_offset)?;

    while let Some(record) = walker.next_record(file)? {
        let Some(seg) = record.segment() else {
            continue;
        };
        if !seg.contains_addr(entry.addr) {
            continue;
        }

        let file_offset = slice_offset + seg.fileoff + (entry.addr - seg.vmaddr);
        info!(
            "[{}] patch VA {:#x} -> file offset {:#x} ({} bytes, segment {})",
            entry.arch,
            entry.addr,
            file_offset,
            entry.asm.len(),
            seg.name()
        );
        file.write_at(file_offset, &entry.asm)?;
        return Ok(());
    }

    Err(Error::VaNotFound {
        arch: entry.arch.name().to_string(),
        addr: entry.addr,
    })
}
