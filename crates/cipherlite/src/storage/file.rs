//! Byte-addressed database files underneath the pager.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{CipherliteError, Result};

/// Raw file the pager reads pages from and writes pages to.
#[allow(clippy::len_without_is_empty)]
pub trait DatabaseFile: Send {
    /// Fill `buf` from `offset`. Short reads are errors.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    fn len(&self) -> Result<u64>;

    fn set_len(&mut self, len: u64) -> Result<()>;

    fn sync(&mut self) -> Result<()>;
}

/// Database file on the local filesystem.
#[derive(Debug)]
pub struct OsFile {
    file: File,
}

impl OsFile {
    /// Open for read/write, creating an empty file if it does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self { file })
    }
}

impl DatabaseFile for OsFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// In-memory database file. Clones share the same bytes, so a test can
/// close a connection and reopen the "same file".
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.bytes
            .lock()
            .map_err(|_| CipherliteError::Storage("Memory file poisoned".to_string()))
    }
}

fn to_index(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| CipherliteError::Storage("Offset exceeds address space".to_string()))
}

impl DatabaseFile for MemoryFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.lock()?;
        let start = to_index(offset)?;
        let end = start + buf.len();
        if end > bytes.len() {
            return Err(CipherliteError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "read past end of memory file",
                ),
            });
        }
        buf.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let mut bytes = self.lock()?;
        let start = to_index(offset)?;
        let end = start + data.len();
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.lock()?.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        let len = to_index(len)?;
        self.lock()?.resize(len, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(file: &mut dyn DatabaseFile) {
        assert_eq!(file.len().unwrap(), 0);

        file.write_at(4, b"page").unwrap();
        assert_eq!(file.len().unwrap(), 8);

        let mut buf = [0u8; 8];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"\0\0\0\0page");

        let mut past_end = [0u8; 4];
        assert!(file.read_at(6, &mut past_end).is_err());

        file.set_len(4).unwrap();
        assert_eq!(file.len().unwrap(), 4);
        file.sync().unwrap();
    }

    #[test]
    fn test_os_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut file = OsFile::open(&path).unwrap();
        exercise(&mut file);
        assert!(path.exists());
    }

    #[test]
    fn test_os_file_keeps_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.db");
        std::fs::write(&path, b"existing").unwrap();

        let file = OsFile::open(&path).unwrap();
        assert_eq!(file.len().unwrap(), 8);
    }

    #[test]
    fn test_memory_file() {
        let mut file = MemoryFile::new();
        exercise(&mut file);
    }

    #[test]
    fn test_memory_file_clones_share_bytes() {
        let mut file = MemoryFile::new();
        let other = file.clone();
        file.write_at(0, b"shared").unwrap();
        assert_eq!(other.snapshot().unwrap(), b"shared");
    }
}
