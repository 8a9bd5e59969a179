//! Disk I/O and file lifecycle.
//!
//! The raw mission file lives at `<final>.part` and is written out of order
//! with positioned writes. Post-processing extracts per-source spans from it;
//! copy-only missions rename it into place.

mod builder;
mod dir;
mod span;
mod writer;

pub use builder::StorageWriterBuilder;
pub use dir::OutputDirectory;
pub use span::{copy_span, SourceSpan};
pub use writer::StorageWriter;

use std::io;
use std::path::{Path, PathBuf};

/// Raw file suffix used until the mission finishes.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the raw file: appends `.part` to the final path (e.g. `a.mp4` → `a.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// First `io::ErrorKind` found in an error chain, if any.
pub fn io_error_kind(err: &anyhow::Error) -> Option<io::ErrorKind> {
    err.chain()
        .find_map(|c| c.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}
