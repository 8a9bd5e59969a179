//! One handler per [`Algorithm`] variant.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::spec::{Algorithm, Container, PostProcessingSpec};
use super::tool::RemuxTool;
use crate::ledger::{RecoveryRecord, SourceRole};
use crate::storage::{copy_span, SourceSpan, StorageWriter};

#[derive(Debug, thiserror::Error)]
pub enum PostProcessError {
    #[error("no {0:?} track in the raw file")]
    MissingTrack(SourceRole),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("could not launch remux tool: {0}")]
    Launch(#[source] io::Error),
    #[error("remux pass {pass} exited with status {status}")]
    ToolFailed { pass: u8, status: i32 },
    #[error("no source for the remux tool to fetch")]
    NoInput,
    #[error("cannot finalize {}: {cause:#}", .path.display())]
    Finalize { path: PathBuf, cause: anyhow::Error },
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> PostProcessError {
    let context = context.into();
    move |source| PostProcessError::Io { context, source }
}

/// Where each downloaded source sits in the raw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLayout {
    pub raw_path: PathBuf,
    pub primary: Option<SourceSpan>,
    pub secondary: Option<SourceSpan>,
}

impl RawLayout {
    pub fn from_record(raw_path: &Path, record: &RecoveryRecord) -> Self {
        let span_of = |role| record.source_with_role(role).and_then(|s| s.span());
        RawLayout {
            raw_path: raw_path.to_path_buf(),
            primary: span_of(SourceRole::Primary),
            secondary: span_of(SourceRole::Secondary),
        }
    }

    /// Spans in file order.
    fn spans(&self) -> Vec<SourceSpan> {
        let mut spans: Vec<SourceSpan> = self.secondary.into_iter().chain(self.primary).collect();
        spans.sort_by_key(|s| s.offset);
        spans
    }
}

/// Produce `final_path` from the raw file. The raw file is removed on success.
///
/// On failure the raw file and any intermediate files stay on disk.
pub fn run(
    spec: &PostProcessingSpec,
    layout: &RawLayout,
    final_path: &Path,
    tool: &dyn RemuxTool,
) -> Result<(), PostProcessError> {
    tracing::info!(algorithm = spec.name(), output = %final_path.display(), "post-processing");
    match spec.algorithm {
        Algorithm::CopyOnly => copy_only(layout, final_path),
        Algorithm::DemuxRemux(_) => demux_remux(spec, layout, final_path, tool),
        Algorithm::MultiTrackMux(target) => {
            multi_track_mux(spec, target, layout, final_path, tool)
        }
        Algorithm::DirectHls => Err(PostProcessError::NoInput),
    }
}

fn copy_only(layout: &RawLayout, final_path: &Path) -> Result<(), PostProcessError> {
    let spans = layout.spans();
    let raw_len = fs::metadata(&layout.raw_path)
        .map_err(io_err(format!("stat {}", layout.raw_path.display())))?
        .len();

    if let [only] = spans.as_slice() {
        if only.offset == 0 && only.length == raw_len {
            return StorageWriter::open_existing(&layout.raw_path)
                .and_then(|writer| writer.sync().map(|()| writer))
                .and_then(|writer| writer.finalize(final_path))
                .map_err(|cause| PostProcessError::Finalize {
                    path: final_path.to_path_buf(),
                    cause,
                });
        }
    }

    for (i, span) in spans.iter().enumerate() {
        copy_span(&layout.raw_path, *span, final_path, i > 0)
            .map_err(io_err(format!("copy into {}", final_path.display())))?;
    }
    remove_quietly(&layout.raw_path);
    Ok(())
}

fn demux_remux(
    spec: &PostProcessingSpec,
    layout: &RawLayout,
    final_path: &Path,
    tool: &dyn RemuxTool,
) -> Result<(), PostProcessError> {
    let span = layout.primary.ok_or(PostProcessError::MissingTrack(SourceRole::Primary))?;
    let track = final_path.with_extension("tmp");
    copy_span(&layout.raw_path, span, &track, false)
        .map_err(io_err(format!("extract {}", track.display())))?;

    let mut args = strings(&["-y", "-i"]);
    args.push(path_arg(&track));
    args.extend(strings(&["-vn", "-c:a", "copy"]));
    args.extend(spec.args.iter().cloned());
    args.push(path_arg(final_path));
    if let Err(e) = invoke(tool, 1, &args) {
        discard_partial(final_path);
        keep_for_inspection(&[&track, &layout.raw_path]);
        return Err(e);
    }

    remove_quietly(&track);
    remove_quietly(&layout.raw_path);
    Ok(())
}

fn multi_track_mux(
    spec: &PostProcessingSpec,
    target: Container,
    layout: &RawLayout,
    final_path: &Path,
    tool: &dyn RemuxTool,
) -> Result<(), PostProcessError> {
    let video_span = layout.primary.ok_or(PostProcessError::MissingTrack(SourceRole::Primary))?;
    let audio_span = layout
        .secondary
        .ok_or(PostProcessError::MissingTrack(SourceRole::Secondary))?;

    let video = final_path.with_extension("video.tmp");
    let audio = final_path.with_extension("audio.tmp");
    let muxed = final_path.with_extension(format!("tmp.{}", target.extension()));

    copy_span(&layout.raw_path, video_span, &video, false)
        .map_err(io_err(format!("extract {}", video.display())))?;
    copy_span(&layout.raw_path, audio_span, &audio, false)
        .map_err(io_err(format!("extract {}", audio.display())))?;

    // Pass 1: interleave both tracks into a temporary container.
    let mut first = strings(&["-y", "-i"]);
    first.push(path_arg(&video));
    first.push("-i".to_string());
    first.push(path_arg(&audio));
    first.extend(strings(&["-strict", "-2", "-c", "copy"]));
    first.extend(spec.args.iter().cloned());
    first.push(path_arg(&muxed));
    if let Err(e) = invoke(tool, 1, &first) {
        keep_for_inspection(&[&video, &audio, &muxed, &layout.raw_path]);
        return Err(e);
    }

    // Pass 2: repackage into the final file (the tool never writes the file it reads).
    let mut second = strings(&["-y", "-i"]);
    second.push(path_arg(&muxed));
    second.extend(strings(&["-strict", "-2", "-c", "copy"]));
    second.push(path_arg(final_path));
    if let Err(e) = invoke(tool, 2, &second) {
        discard_partial(final_path);
        keep_for_inspection(&[&video, &audio, &muxed, &layout.raw_path]);
        return Err(e);
    }

    for p in [&video, &audio, &muxed, &layout.raw_path] {
        remove_quietly(p);
    }
    Ok(())
}

pub(super) fn invoke(
    tool: &dyn RemuxTool,
    pass: u8,
    args: &[String],
) -> Result<(), PostProcessError> {
    match tool.execute(args).map_err(PostProcessError::Launch)? {
        0 => Ok(()),
        status => Err(PostProcessError::ToolFailed { pass, status }),
    }
}

pub(super) fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub(super) fn path_arg(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), "could not remove: {}", e);
        }
    }
}

fn discard_partial(final_path: &Path) {
    remove_quietly(final_path);
}

fn keep_for_inspection(paths: &[&Path]) {
    let existing: Vec<String> = paths
        .iter()
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .collect();
    tracing::warn!(files = ?existing, "post-processing failed; intermediate files left on disk");
}
