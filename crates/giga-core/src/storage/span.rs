//! Extracting one source's bytes out of the raw file.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Where one source's content sits inside the raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub offset: u64,
    pub length: u64,
}

/// Copy `span` from `src` into `dst`, creating or appending per `append`.
/// Fails with `UnexpectedEof` if `src` is shorter than the span.
pub fn copy_span(src: &Path, span: SourceSpan, dst: &Path, append: bool) -> io::Result<()> {
    let mut input = File::open(src)?;
    input.seek(SeekFrom::Start(span.offset))?;
    let mut output = File::options()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(dst)?;
    let copied = io::copy(&mut io::Read::take(&mut input, span.length), &mut output)?;
    if copied != span.length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{}: span {}+{} truncated after {} bytes",
                src.display(),
                span.offset,
                span.length,
                copied
            ),
        ));
    }
    output.flush()
}
