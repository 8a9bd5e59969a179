//! Block-fetch worker loop.

use std::io;

use super::error::MissionError;
use super::shared::{MissionCore, WorkItem};
use super::state::MissionEvent;
use crate::http::HttpRequest;
use crate::retry::{classify, run_with_retry, ErrorKind, FetchError};
use crate::storage::StorageWriter;

/// Claims items until the queue is empty or the mission stops.
pub(crate) fn run_worker(core: &MissionCore, worker: usize) {
    let storage = match StorageWriter::open_existing(&core.raw_path) {
        Ok(s) => s,
        Err(e) => {
            core.notify_error(MissionError::from_storage(e));
            return;
        }
    };

    while core.is_running() {
        let Some(item) = core.claim_next() else {
            break;
        };
        let outcome = run_with_retry(&core.options.retry, classify, |attempt| {
            if attempt > 1 {
                tracing::debug!(mission = core.id, worker, ?item, attempt, "retrying");
            }
            fetch(core, &storage, item)
        });

        let err = match outcome {
            Ok(written) => {
                core.complete(item, written);
                continue;
            }
            Err(e) => e,
        };
        let kind = classify(&err);
        if kind == ErrorKind::Aborted {
            break;
        }
        if kind != ErrorKind::Storage && core.requeue_once(item) {
            tracing::warn!(
                mission = core.id,
                worker,
                ?item,
                "fetch failed, returning to pool: {}",
                err
            );
            if kind == ErrorKind::Forbidden {
                refresh_source(core, item);
            }
            continue;
        }
        tracing::warn!(mission = core.id, worker, ?item, "fetch failed again: {}", err);
        core.notify_error(MissionError::from_fetch(err));
        break;
    }
    tracing::trace!(mission = core.id, worker, "worker done");
}

/// One attempt at `item`. Returns the bytes written.
fn fetch(core: &MissionCore, storage: &StorageWriter, item: WorkItem) -> Result<u64, FetchError> {
    core.ensure_running()?;
    let job = core
        .assignment(item)
        .ok_or_else(|| FetchError::Protocol(format!("no layout for {:?}", item)))?;

    let mut request = HttpRequest::get(&job.url)
        .with_headers(&core.options.headers)
        .with_abort(core.halt_signal());
    if let Some(block) = job.block {
        request = request.with_range(block.start, Some(block.last_byte()));
    }

    let mut written = 0u64;
    let result = core.services.http.execute(&request, &mut |data: &[u8]| {
        if !core.is_running() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "mission stopped"));
        }
        let len = data.len() as u64;
        if let Some(limit) = job.expected {
            if written + len > limit {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("server sent more than the {} bytes requested", limit),
                ));
            }
        }
        storage.write_at(job.file_offset + written, data)?;
        written += len;
        core.notify_progress(len);
        Ok(())
    });

    let outcome = match result {
        Err(e) => Err(FetchError::from(e)),
        Ok(resp) if !resp.is_success() => Err(FetchError::Http(resp.status)),
        Ok(resp) if job.block.is_some() && resp.status != 206 => Err(FetchError::Protocol(format!(
            "ranged request answered with {}",
            resp.status
        ))),
        Ok(_) => match job.expected {
            Some(expected) if written != expected => Err(FetchError::PartialTransfer {
                expected,
                received: written,
            }),
            _ => Ok(written),
        },
    };
    if outcome.is_err() {
        core.rewind_progress(written);
    }
    outcome
}

/// Ask the resolver for a fresh URL for the source behind `item`.
fn refresh_source(core: &MissionCore, item: WorkItem) {
    let Some(resolver) = core.services.resolver.as_ref() else {
        return;
    };
    let Some(job) = core.assignment(item) else {
        return;
    };
    let Some(source) = core.source(job.source) else {
        return;
    };
    match resolver.resolve(&source) {
        Ok(url) => {
            core.replace_url(job.source, url);
            core.emit(MissionEvent::SourceRefreshed {
                id: core.id,
                source: job.source,
            });
        }
        Err(e) => tracing::warn!(
            mission = core.id,
            source = job.source,
            "re-resolution failed: {:#}",
            e
        ),
    }
}
