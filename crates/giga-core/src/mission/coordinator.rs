//! The per-mission coordinator thread: initializer, worker pool, barrier,
//! then post-processing.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use super::error::{MissionError, MissionErrorKind};
use super::initializer::{self, InitFailure};
use super::request::MissionKind;
use super::shared::MissionCore;
use super::state::MissionState;
use super::worker::run_worker;
use crate::ledger::SourceRole;
use crate::postprocess::{self, RawLayout};
use crate::retry::FetchError;
use crate::storage::{StorageWriter, StorageWriterBuilder};

pub(crate) fn run(core: Arc<MissionCore>) {
    match local_source(&core) {
        Ok(Some(path)) => return copy_local(&core, path),
        Ok(None) => {}
        Err(e) => return core.notify_error(MissionError::from_fetch(e)),
    }
    if !core.post.downloads_sources() {
        return fetch_with_tool(&core);
    }

    loop {
        core.set_state(MissionState::Initializing);
        match initializer::run(&core) {
            Ok(()) => break,
            Err(InitFailure::Aborted) => return settle_stopped(&core),
            Err(InitFailure::Recover) => {
                if !recover(&core) {
                    return;
                }
            }
            Err(InitFailure::Fatal(e)) => return core.notify_error(e),
        }
    }
    core.checkpoint();
    core.set_state(MissionState::Downloading);

    let workers = core.worker_count();
    tracing::info!(mission = core.id, workers, "downloading");
    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let worker_core = Arc::clone(&core);
        let spawned = thread::Builder::new()
            .name(format!("giga-worker-{}", i))
            .spawn(move || run_worker(&worker_core, i));
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) => {
                core.notify_error(MissionError::with_cause(MissionErrorKind::Unknown, e));
                break;
            }
        }
    }
    // Barrier: nothing below runs until every worker is gone.
    for h in handles {
        if h.join().is_err() {
            core.notify_error(MissionError::new(
                MissionErrorKind::Unknown,
                "worker thread panicked",
            ));
        }
    }

    if core.has_error() {
        return;
    }
    if !core.all_done() {
        return settle_stopped(&core);
    }
    post_process(&core);
}

fn post_process(core: &MissionCore) {
    core.set_state(MissionState::PostProcessing);
    let record = core.snapshot_record();
    let layout = RawLayout::from_record(&core.raw_path, &record);
    match postprocess::run(&core.post, &layout, &core.final_path, core.services.tool.as_ref()) {
        Ok(()) => core.notify_finished(),
        Err(e) => core.notify_error(MissionError::with_cause(MissionErrorKind::PostProcessing, e)),
    }
}

/// The remux tool pulls the sources straight into the final file.
fn fetch_with_tool(core: &MissionCore) {
    if !core.is_running() {
        return settle_stopped(core);
    }
    core.set_state(MissionState::PostProcessing);
    let record = core.snapshot_record();
    let urls: Vec<String> = [SourceRole::Primary, SourceRole::Secondary]
        .into_iter()
        .filter_map(|role| record.source_with_role(role))
        .map(|s| s.url.clone())
        .collect();
    let fetched = postprocess::fetch_direct(
        &core.post,
        &urls,
        &core.options.headers,
        &core.final_path,
        core.services.tool.as_ref(),
    );
    match fetched {
        Ok(()) => {
            if let Ok(meta) = std::fs::metadata(&core.final_path) {
                core.notify_progress(meta.len());
            }
            core.notify_finished();
        }
        Err(e) => core.notify_error(MissionError::with_cause(MissionErrorKind::PostProcessing, e)),
    }
}

/// Paused or cancelled: checkpoint, or delete the partial output.
fn settle_stopped(core: &MissionCore) {
    if core.cancel_requested() {
        core.settle_cancelled();
    } else {
        core.checkpoint();
        core.set_state(MissionState::Paused);
        tracing::info!(mission = core.id, "mission paused");
    }
}

/// Re-resolve every source URL. False when the mission cannot continue
/// (no resolver, budget spent, resolver failure, or stopped meanwhile).
fn recover(core: &MissionCore) -> bool {
    let Some(resolver) = core.services.resolver.clone() else {
        core.notify_error(MissionError::new(
            MissionErrorKind::HttpForbidden,
            "source URL rejected and no resolver is available",
        ));
        return false;
    };
    if !core.begin_recovery() {
        core.notify_error(MissionError::new(
            MissionErrorKind::HttpForbidden,
            format!(
                "source URL still rejected after {} re-resolutions",
                core.options.max_recoveries
            ),
        ));
        return false;
    }

    core.set_state(MissionState::Recovering);
    let sources = core.snapshot_record().sources;
    for (i, source) in sources.iter().enumerate() {
        if !core.is_running() {
            settle_stopped(core);
            return false;
        }
        match resolver.resolve(source) {
            Ok(url) => core.replace_url(i, url),
            Err(e) => {
                core.notify_error(MissionError::with_cause(MissionErrorKind::HttpForbidden, e));
                return false;
            }
        }
    }
    true
}

/// Subtitle missions with a single `file://` source are copied from disk.
/// Every other mission must fetch over HTTP.
fn local_source(core: &MissionCore) -> Result<Option<PathBuf>, FetchError> {
    let record = core.snapshot_record();
    if core.kind == MissionKind::Subtitle {
        if let [only] = record.sources.as_slice() {
            if only.is_local() {
                let path = url::Url::parse(&only.url)
                    .ok()
                    .and_then(|u| u.to_file_path().ok())
                    .ok_or_else(|| FetchError::Protocol(format!("bad file URL {}", only.url)))?;
                return Ok(Some(path));
            }
        }
    }
    match record.sources.iter().find(|s| s.is_local()) {
        Some(s) => Err(FetchError::Protocol(format!(
            "{} is a local file; only subtitle missions copy local sources",
            s.url
        ))),
        None => Ok(None),
    }
}

fn copy_local(core: &MissionCore, path: PathBuf) {
    core.set_state(MissionState::Downloading);
    let writer = match copy_local_file(core, &path) {
        Ok(Some(writer)) => writer,
        Ok(None) => return settle_stopped(core),
        Err(e) => return core.notify_error(e),
    };
    let finished = writer.sync().and_then(|()| writer.finalize(&core.final_path));
    if let Err(e) = finished {
        return core.notify_error(MissionError::from_storage(e));
    }
    core.notify_finished();
}

/// Returns `None` when stopped before the copy finished.
fn copy_local_file(
    core: &MissionCore,
    path: &std::path::Path,
) -> Result<Option<StorageWriter>, MissionError> {
    let mut input =
        File::open(path).map_err(|e| MissionError::with_cause(MissionErrorKind::FileCreation, e))?;
    let writer = StorageWriterBuilder::create(&core.raw_path)
        .map_err(MissionError::from_storage)?
        .build();

    let mut buf = vec![0u8; 64 * 1024];
    let mut offset = 0u64;
    loop {
        if !core.is_running() {
            return Ok(None);
        }
        let n = input
            .read(&mut buf)
            .map_err(|e| MissionError::with_cause(MissionErrorKind::Unknown, e))?;
        if n == 0 {
            break;
        }
        writer.write_at(offset, &buf[..n]).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
                MissionErrorKind::PermissionDenied
            } else {
                MissionErrorKind::Unknown
            };
            MissionError::with_cause(kind, e)
        })?;
        offset += n as u64;
        core.notify_progress(n as u64);
    }
    tracing::debug!(
        mission = core.id,
        bytes = offset,
        from = %path.display(),
        "local source copied"
    );
    Ok(Some(writer))
}
