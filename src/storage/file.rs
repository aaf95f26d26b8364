//! File-backed record storage: a writable mapping that grows on disk, and a
//! read-only mapping of a saved index.
//!
//! In both structs the mapping field is declared before the file so that it
//! is dropped, and therefore unmapped, before the handle is closed.

use crate::error::{ForestError, Result};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Records written straight into a file through a writable mapping.
#[derive(Debug)]
pub(crate) struct DiskRecords {
    map: Option<MmapMut>,
    file: File,
    path: PathBuf,
    stride: usize,
    capacity: usize,
}

impl DiskRecords {
    /// Create (or truncate) `path` and prepare it for writing.
    pub fn create(path: &Path, stride: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            map: None,
            file,
            path: path.to_path_buf(),
            stride,
            capacity: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extend the file to hold `records` records and remap it.
    pub fn grow_to(&mut self, records: usize) -> Result<()> {
        if records <= self.capacity {
            return Ok(());
        }
        self.resize_file(records)
    }

    /// Cut the file down to exactly `records` records.
    pub fn finish(&mut self, records: usize) -> Result<()> {
        self.flush()?;
        self.resize_file(records)
    }

    fn resize_file(&mut self, records: usize) -> Result<()> {
        // Unmap before changing the file length.
        let len = records
            .checked_mul(self.stride)
            .ok_or_else(|| ForestError::out_of_memory(records, self.stride))?;
        self.map = None;
        self.file.set_len(len as u64)?;
        self.capacity = records;
        if records > 0 {
            // SAFETY: the file is owned by this struct for the lifetime of the
            // mapping and is not resized while mapped.
            let map = unsafe { MmapOptions::new().map_mut(&self.file)? };
            self.map = Some(map);
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self.map.as_mut() {
            Some(map) => &mut map[..],
            None => &mut [],
        }
    }
}

/// A saved index mapped read-only.
#[derive(Debug)]
pub(crate) struct MappedRecords {
    map: Mmap,
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl MappedRecords {
    /// Map `path` read-only. With `prefault`, pages are populated up front
    /// and the kernel is told they will be needed.
    pub fn open(path: &Path, prefault: bool) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(ForestError::invalid_format(format!(
                "{} is empty",
                path.display()
            )));
        }

        let mut options = MmapOptions::new();
        if prefault {
            options.populate();
        }
        // SAFETY: the mapping is read-only; modifying the file while it is
        // mapped is outside this crate's contract.
        let map = unsafe { options.map(&file)? };

        #[cfg(unix)]
        if prefault {
            if let Err(err) = map.advise(memmap2::Advice::WillNeed) {
                tracing::warn!(path = %path.display(), error = %err, "madvise(WILLNEED) failed");
            }
        }

        Ok(Self {
            map,
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disk_records_grow_and_finish() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.bin");

        let mut records = DiskRecords::create(&path, 12).unwrap();
        assert!(records.bytes().is_empty());

        records.grow_to(4).unwrap();
        assert_eq!(records.bytes().len(), 48);
        records.bytes_mut()[0] = 42;

        records.grow_to(10).unwrap();
        assert_eq!(records.bytes()[0], 42);

        records.finish(2).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);
        assert_eq!(records.bytes()[0], 42);
    }

    #[test]
    fn test_mapped_records_rejects_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let err = MappedRecords::open(&path, false).unwrap_err();
        assert!(matches!(err, ForestError::InvalidFormat(_)));
    }

    #[test]
    fn test_mapped_records_reads_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [1u8, 2, 3, 4]).unwrap();

        let mapped = MappedRecords::open(&path, true).unwrap();
        assert_eq!(mapped.bytes(), &[1, 2, 3, 4]);
        assert_eq!(mapped.path(), path.as_path());
    }
}
