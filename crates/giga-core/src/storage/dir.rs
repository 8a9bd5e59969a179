//! Output directory: find/create files by name.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// A user-chosen directory missions write their final files into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectory {
    root: PathBuf,
}

impl OutputDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputDirectory { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) if missing.
    pub fn mkdirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Path of an existing entry named `name`, if any.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        let path = self.root.join(name);
        path.exists().then_some(path)
    }

    /// Create an empty file `name` and check it can be written.
    pub fn create_file(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&path)?;
        if file.metadata()?.permissions().readonly() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not writable", path.display()),
            ));
        }
        Ok(path)
    }
}
