//! Sizing, layout and resume validation; runs before any worker starts.

use super::error::{MissionError, MissionErrorKind};
use super::shared::MissionCore;
use super::state::InitStage;
use crate::ledger::{RecoveryRecord, TransferMode};
use crate::postprocess::PostProcessingSpec;
use crate::probe::{probe, ProbeResult};
use crate::retry::{classify, run_with_retry, ErrorKind, FetchError};
use crate::safe_resume::validate_source;
use crate::segmenter::{allocate_blocks, BlockBitmap};
use crate::storage::{StorageWriter, StorageWriterBuilder};

/// Reserved leading space when some source length is unknown.
pub const RESERVE_SPACE_DEFAULT: u64 = 5 * 1024 * 1024;
/// Upper bound for the reserved leading space.
pub const RESERVE_SPACE_MAXIMUM: u64 = 150 * 1024 * 1024;

/// Why the initializer did not hand off to the workers.
#[derive(Debug)]
pub(crate) enum InitFailure {
    /// Paused or cancelled while probing; not an error.
    Aborted,
    /// A source answered 401/403; its URL must be re-resolved.
    Recover,
    Fatal(MissionError),
}

/// Leading space to keep free: the smallest source length, capped, or the
/// default when any length is unknown. Zero when nothing is post-processed.
pub(crate) fn reserve_for(post: &PostProcessingSpec, lengths: &[Option<u64>]) -> u64 {
    if !post.reserves_space() {
        return 0;
    }
    let mut lowest: Option<u64> = None;
    for length in lengths {
        match length {
            Some(l) if *l > 0 => lowest = Some(lowest.map_or(*l, |cur| cur.min(*l))),
            _ => return RESERVE_SPACE_DEFAULT,
        }
    }
    lowest.map_or(RESERVE_SPACE_DEFAULT, |l| l.min(RESERVE_SPACE_MAXIMUM))
}

/// Offsets in layout order, starting after the reserve. Stops at the first
/// unknown length; later sources are placed once that one completes.
pub(crate) fn assign_offsets(record: &mut RecoveryRecord) {
    let mut cursor = record.reserved;
    for i in record.layout_order() {
        let source = &mut record.sources[i];
        source.offset = cursor;
        match source.length {
            Some(length) => cursor += length,
            None => break,
        }
    }
}

pub(crate) fn run(core: &MissionCore) -> Result<(), InitFailure> {
    let fresh = run_with_retry(&core.options.retry, classify, |attempt| {
        if attempt > 1 {
            tracing::warn!(mission = core.id, attempt, "initializer retrying");
        }
        probe_and_plan(core)
    })
    .map_err(|e| match classify(&e) {
        ErrorKind::Aborted => InitFailure::Aborted,
        ErrorKind::Forbidden => {
            tracing::warn!(mission = core.id, "source rejected: {}", e);
            InitFailure::Recover
        }
        _ => InitFailure::Fatal(MissionError::from_fetch(e)),
    })?;

    if !core.is_running() {
        return Err(InitFailure::Aborted);
    }
    prepare_storage(core, fresh).map_err(InitFailure::Fatal)?;
    core.set_stage(InitStage::Ready);
    core.rebuild_queue();
    Ok(())
}

/// Returns true when a new layout was planned, false when a stored one was kept.
fn probe_and_plan(core: &MissionCore) -> Result<bool, FetchError> {
    if core.snapshot_record().planned {
        core.set_stage(InitStage::ValidatingForResume);
        if still_valid(core)? {
            return Ok(false);
        }
        core.discard_plan();
    }

    let mut record = core.snapshot_record();
    let http = core.services.http.as_ref();
    let headers = &core.options.headers;

    core.set_stage(InitStage::ProbingSources);
    let mut probes: Vec<ProbeResult> = Vec::with_capacity(record.sources.len());
    for source in &record.sources {
        core.ensure_running()?;
        let result = probe(http, &source.url, headers, (0, None))?;
        tracing::debug!(
            mission = core.id,
            url = %source.url,
            status = result.status,
            length = ?result.content_length,
            "probed source"
        );
        probes.push(result);
    }
    core.ensure_running()?;

    let lengths: Vec<Option<u64>> = probes.iter().map(|p| p.content_length).collect();
    // The primary source decides; an empty one fails even with a secondary track.
    if probes.iter().any(|p| p.status == 204) || lengths.first() == Some(&Some(0)) {
        return Err(FetchError::NoContent);
    }
    core.set_stage(InitStage::SizingDone);

    core.set_stage(InitStage::ReservingSpace);
    record.reserved = reserve_for(&core.post, &lengths);
    record.block_size = core.options.block_size;

    let mut next_block = 0usize;
    for (source, first) in record.sources.iter_mut().zip(&probes) {
        source.length = first.content_length;
        source.validator = None;
        source.mode = TransferMode::Stream;
        source.done = false;

        let Some(length) = first.content_length else {
            record.unknown_length = true;
            tracing::debug!(mission = core.id, url = %source.url, "length unknown, single stream");
            continue;
        };

        // A ranged probe near the end tells whether the server honours ranges.
        let check = probe(http, &source.url, headers, (length.saturating_sub(10), Some(length)))?;
        core.ensure_running()?;
        let blocks = allocate_blocks(
            Some(length),
            check.status == 206,
            core.options.threads,
            core.options.block_size,
        );
        if blocks.is_empty() {
            tracing::debug!(
                mission = core.id,
                url = %source.url,
                status = check.status,
                "single stream"
            );
        } else {
            source.mode = TransferMode::Blocks {
                first: next_block,
                count: blocks.len(),
            };
            next_block += blocks.len();
        }
        source.validator = check.validator().or(first.validator()).map(str::to_string);
    }

    if record.unknown_length {
        for source in &mut record.sources {
            source.mode = TransferMode::Stream;
        }
        next_block = 0;
    }
    record.block_count = next_block;
    record.planned = true;
    assign_offsets(&mut record);
    record.bitmap = BlockBitmap::new(next_block).to_bytes();

    tracing::info!(
        mission = core.id,
        blocks = record.block_count,
        reserved = record.reserved,
        total = ?record.total_length(),
        unknown_length = record.unknown_length,
        "mission planned"
    );
    core.install_plan(record);
    Ok(true)
}

/// Re-probe block-mode sources and compare with the stored layout.
fn still_valid(core: &MissionCore) -> Result<bool, FetchError> {
    let record = core.snapshot_record();
    let http = core.services.http.as_ref();
    for source in &record.sources {
        let (TransferMode::Blocks { .. }, Some(length)) = (source.mode, source.length) else {
            continue;
        };
        core.ensure_running()?;
        let current = probe(
            http,
            &source.url,
            &core.options.headers,
            (length.saturating_sub(10), Some(length)),
        )?;
        if let Err(mismatch) = validate_source(source, &current) {
            tracing::warn!(
                mission = core.id,
                url = %source.url,
                "{}; discarding progress",
                mismatch
            );
            return Ok(false);
        }
        if current.status != 206 {
            tracing::warn!(
                mission = core.id,
                url = %source.url,
                "ranges no longer honoured; discarding progress"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Create or reopen the raw file and size it to the planned layout.
fn prepare_storage(core: &MissionCore, fresh: bool) -> Result<(), MissionError> {
    let record = core.snapshot_record();
    let path = &core.raw_path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
                MissionErrorKind::PermissionDenied
            } else {
                MissionErrorKind::FileCreation
            };
            MissionError::with_cause(kind, e)
        })?;
    }

    let size = record.file_length().unwrap_or(record.reserved);
    if fresh || !path.exists() {
        if !fresh {
            tracing::warn!(
                mission = core.id,
                path = %path.display(),
                "raw file missing; starting over"
            );
            core.reset_progress();
        }
        let mut builder = StorageWriterBuilder::create(path).map_err(MissionError::from_storage)?;
        builder.preallocate(size).map_err(MissionError::from_storage)?;
        return Ok(());
    }

    let writer = StorageWriter::open_existing(path).map_err(MissionError::from_storage)?;
    if record.unknown_length {
        return Ok(());
    }
    let current = writer.len().map_err(MissionError::from_storage)?;
    if current != size {
        tracing::debug!(mission = core.id, current, size, "resizing raw file for resume");
        writer.set_len(size).map_err(MissionError::from_storage)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SourceRecord, SourceRole};
    use crate::postprocess::{Algorithm, Container};

    fn mux() -> PostProcessingSpec {
        PostProcessingSpec::new(Algorithm::MultiTrackMux(Container::Mp4))
    }

    #[test]
    fn reserve_uses_smallest_source() {
        assert_eq!(reserve_for(&mux(), &[Some(5_000), Some(1_000)]), 1_000);
        assert_eq!(
            reserve_for(&mux(), &[Some(u64::MAX), Some(RESERVE_SPACE_MAXIMUM + 1)]),
            RESERVE_SPACE_MAXIMUM
        );
        assert_eq!(reserve_for(&mux(), &[Some(5_000), None]), RESERVE_SPACE_DEFAULT);
        assert_eq!(reserve_for(&PostProcessingSpec::default(), &[Some(5_000)]), 0);
    }

    #[test]
    fn secondary_sits_right_after_the_reserve() {
        let mut video = SourceRecord::new("http://h/v", SourceRole::Primary);
        video.length = Some(5_000);
        let mut audio = SourceRecord::new("http://h/a", SourceRole::Secondary);
        audio.length = Some(1_000);
        let mut record = RecoveryRecord::new(vec![video, audio]);
        record.reserved = reserve_for(&mux(), &[Some(5_000), Some(1_000)]);

        assign_offsets(&mut record);
        assert_eq!(record.sources[1].offset, 1_000);
        assert_eq!(record.sources[0].offset, 2_000);
        assert_eq!(record.file_length(), Some(7_000));
    }

    #[test]
    fn unknown_length_stops_offset_assignment() {
        let mut video = SourceRecord::new("http://h/v", SourceRole::Primary);
        video.length = Some(5_000);
        video.offset = 99;
        let audio = SourceRecord::new("http://h/a", SourceRole::Secondary);
        let mut record = RecoveryRecord::new(vec![video, audio]);
        record.reserved = RESERVE_SPACE_DEFAULT;

        assign_offsets(&mut record);
        assert_eq!(record.sources[1].offset, RESERVE_SPACE_DEFAULT);
        assert_eq!(record.sources[0].offset, 99);
    }
}
