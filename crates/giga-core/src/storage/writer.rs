//! Positioned writer over the raw mission file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Writer for the raw file. Each `write_at` is independent (pwrite), so
/// workers writing disjoint ranges need no coordination.
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            path,
        }
    }

    /// Open an existing raw file for resume (read+write, no truncation).
    pub fn open_existing(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open output file: {}", path.display()))?;
        Ok(Self::from_file_and_path(file, path.to_path_buf()))
    }

    /// Write `data` at `offset` without touching any shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    /// Non-Unix fallback: seek + write on a cloned handle.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Truncate or extend to exactly `size` bytes.
    pub fn set_len(&self, size: u64) -> Result<()> {
        self.file
            .set_len(size)
            .with_context(|| format!("failed to resize {} to {} bytes", self.path.display(), size))
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata().context("stat output file")?.len())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("storage sync failed")
    }

    /// Rename the raw file to `final_path`. Consumes the writer and closes this handle.
    pub fn finalize(self, final_path: &Path) -> Result<()> {
        let path = self.path.clone();
        drop(self.file);
        std::fs::rename(&path, final_path)
            .with_context(|| {
                format!("failed to rename {} to {}", path.display(), final_path.display())
            })
    }
}
