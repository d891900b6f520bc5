//! Scoped read/write access to the binary on disk.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// A seekable byte store over the binary being modified.
///
/// All structural parsing and patching goes through `read_at`/`write_at`;
/// nothing in the crate aliases the file contents in memory. The handle is
/// opened for read-and-update access and released when the value is dropped,
/// on success and error paths alike.
#[derive(Debug)]
pub struct BinaryFile {
    file: File,
}

impl BinaryFile {
    /// Opens the file at `path` for read-and-update access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// A read past the end of the file is a [`Error::ShortRead`] (truncated
    /// container), never a partial buffer.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::ShortRead {
                    offset,
                    wanted: len,
                }
            } else {
                Error::Io(e)
            }
        })?;
        Ok(buf)
    }

    /// Writes `data` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_with(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_write_at() {
        let (_dir, path) = temp_with(&[0u8; 16]);
        let mut f = BinaryFile::open(&path).unwrap();

        f.write_at(4, &[0xAA, 0xBB]).unwrap();
        assert_eq!(f.read_at(4, 2).unwrap(), vec![0xAA, 0xBB]);
        assert_eq!(f.read_at(0, 4).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_short_read() {
        let (_dir, path) = temp_with(&[0u8; 4]);
        let mut f = BinaryFile::open(&path).unwrap();

        assert!(matches!(
            f.read_at(2, 8),
            Err(Error::ShortRead { offset: 2, wanted: 8 })
        ));
    }

    #[test]
    fn test_open_missing() {
        assert!(matches!(
            BinaryFile::open("/nonexistent/machtweak-test"),
            Err(Error::FileOpen { .. })
        ));
    }
}
