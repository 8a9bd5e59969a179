//! Shared mission state behind one coordination lock.
//!
//! The initializer, the coordinator and every worker go through
//! [`MissionCore`]. Claims, progress counters, the bitmap and the ledger
//! record live in [`MissionInner`] under a single mutex; byte writes happen
//! outside it since each worker owns a disjoint file range.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::MissionError;
use super::request::{MissionKind, MissionOptions, MissionRequest, MissionServices};
use super::state::{InitStage, MissionEvent, MissionState};
use crate::http::AbortSignal;
use crate::ledger::{MissionId, RecoveryRecord, SourceRecord, TransferMode};
use crate::postprocess::PostProcessingSpec;
use crate::retry::FetchError;
use crate::segmenter::{Block, BlockBitmap};
use crate::storage::temp_path;

/// Emit a checkpoint after this many completed blocks.
const CHECKPOINT_EVERY: usize = 2;

/// A unit of work handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum WorkItem {
    /// Flattened block index into the mission bitmap.
    Block(usize),
    /// Whole-source stream (no ranges, or unknown length).
    Stream(usize),
}

/// Everything a worker needs to fetch one item.
#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    pub source: usize,
    pub url: String,
    /// Absolute position in the raw file where the first byte goes.
    pub file_offset: u64,
    /// Range within the source; `None` for a stream.
    pub block: Option<Block>,
    /// Known stream length, for short-body detection.
    pub expected: Option<u64>,
}

pub(crate) struct MissionInner {
    pub record: RecoveryRecord,
    pub bitmap: BlockBitmap,
    pub state: MissionState,
    pub stage: InitStage,
    pub queue: VecDeque<WorkItem>,
    /// Failures per item during this run.
    pub failures: HashMap<WorkItem, u32>,
    pub bytes_done: u64,
    pub error: Option<MissionError>,
    pub recoveries: u32,
    since_checkpoint: usize,
}

pub(crate) struct MissionCore {
    pub id: MissionId,
    pub kind: MissionKind,
    pub final_path: PathBuf,
    pub raw_path: PathBuf,
    pub post: PostProcessingSpec,
    pub options: MissionOptions,
    pub services: MissionServices,
    running: AtomicBool,
    /// Fired on every stop so in-flight transfers give up without waiting for bytes.
    halt: AbortSignal,
    cancel_requested: AtomicBool,
    inner: Mutex<MissionInner>,
}

impl MissionCore {
    pub fn new(
        request: MissionRequest,
        options: MissionOptions,
        services: MissionServices,
    ) -> Self {
        let record = request.record;
        let bitmap = BlockBitmap::from_bytes(&record.bitmap, record.block_count);
        MissionCore {
            id: request.id,
            kind: request.kind,
            raw_path: temp_path(&request.final_path),
            final_path: request.final_path,
            post: request.post,
            options,
            services,
            running: AtomicBool::new(false),
            halt: AbortSignal::new(),
            cancel_requested: AtomicBool::new(false),
            inner: Mutex::new(MissionInner {
                record,
                bitmap,
                state: MissionState::Pending,
                stage: InitStage::Idle,
                queue: VecDeque::new(),
                failures: HashMap::new(),
                bytes_done: 0,
                error: None,
                recoveries: 0,
                since_checkpoint: 0,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, MissionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `Err(Aborted)` once the mission was paused, cancelled or failed.
    pub fn ensure_running(&self) -> Result<(), FetchError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(FetchError::Aborted)
        }
    }

    /// Arms the mission for a new run; false if it is already running.
    pub fn arm(&self) -> bool {
        self.cancel_requested.store(false, Ordering::SeqCst);
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.halt.reset();
        true
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.halt.abort();
    }

    pub fn halt_signal(&self) -> AbortSignal {
        self.halt.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: MissionEvent) {
        if let Some(tx) = &self.services.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    pub fn state(&self) -> MissionState {
        self.lock().state
    }

    pub fn set_state(&self, state: MissionState) {
        self.lock().state = state;
        tracing::debug!(mission = self.id, %state, "state");
        self.emit(MissionEvent::State { id: self.id, state });
    }

    pub fn set_stage(&self, stage: InitStage) {
        self.lock().stage = stage;
        tracing::trace!(mission = self.id, ?stage, "initializer");
    }

    /// Bytes written for some block or stream.
    pub fn notify_progress(&self, delta: u64) {
        let (done, total) = {
            let mut inner = self.lock();
            inner.bytes_done += delta;
            (inner.bytes_done, inner.record.total_length())
        };
        self.emit(MissionEvent::Progress {
            id: self.id,
            done,
            total,
        });
    }

    /// Take back bytes of an attempt that did not complete.
    pub fn rewind_progress(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        let mut inner = self.lock();
        inner.bytes_done = inner.bytes_done.saturating_sub(delta);
    }

    /// Record a fatal error and stop every worker. The first error wins.
    pub fn notify_error(&self, err: MissionError) {
        self.stop();
        let kind = err.kind;
        let message = err.message().to_string();
        {
            let mut inner = self.lock();
            if inner.error.is_some() {
                tracing::debug!(mission = self.id, "further error ignored: {}", err);
                return;
            }
            inner.error = Some(err);
            inner.state = MissionState::Error(kind);
        }
        tracing::error!(mission = self.id, %kind, "mission failed: {}", message);
        self.emit(MissionEvent::State {
            id: self.id,
            state: MissionState::Error(kind),
        });
        self.emit(MissionEvent::Failed {
            id: self.id,
            kind,
            message,
        });
    }

    pub fn notify_finished(&self) {
        self.stop();
        tracing::info!(mission = self.id, path = %self.final_path.display(), "mission finished");
        self.set_state(MissionState::Finished);
    }

    /// Move to `Deleted` and remove partial output, unless the mission
    /// already finished or was deleted. Returns whether anything changed.
    pub fn settle_cancelled(&self) -> bool {
        {
            let mut inner = self.lock();
            if matches!(inner.state, MissionState::Finished | MissionState::Deleted) {
                return false;
            }
            inner.state = MissionState::Deleted;
        }
        self.delete_files();
        tracing::debug!(mission = self.id, "state deleted");
        self.emit(MissionEvent::State {
            id: self.id,
            state: MissionState::Deleted,
        });
        true
    }

    pub fn has_error(&self) -> bool {
        self.lock().error.is_some()
    }

    /// Forget a previous failure so the mission can be started again.
    pub fn clear_error(&self) {
        let mut inner = self.lock();
        inner.error = None;
        inner.failures.clear();
        inner.recoveries = 0;
    }

    /// Ledger snapshot including the current bitmap.
    pub fn snapshot_record(&self) -> RecoveryRecord {
        let inner = self.lock();
        let mut record = inner.record.clone();
        record.bitmap = inner.bitmap.to_bytes();
        record
    }

    pub fn checkpoint(&self) {
        let record = {
            let mut inner = self.lock();
            inner.since_checkpoint = 0;
            let mut record = inner.record.clone();
            record.bitmap = inner.bitmap.to_bytes();
            record
        };
        self.emit(MissionEvent::Checkpoint { id: self.id, record });
    }

    /// Install a freshly planned layout, dropping any previous progress.
    pub fn install_plan(&self, record: RecoveryRecord) {
        let mut inner = self.lock();
        inner.bitmap = BlockBitmap::new(record.block_count);
        inner.record = record;
        inner.bytes_done = 0;
    }

    /// Drop the layout so the next initializer pass plans from scratch.
    pub fn discard_plan(&self) {
        let mut inner = self.lock();
        inner.record.reset_plan();
        inner.bitmap = BlockBitmap::new(0);
        inner.bytes_done = 0;
    }

    /// Keep the layout but forget which parts were downloaded.
    pub fn reset_progress(&self) {
        let mut inner = self.lock();
        inner.bitmap = BlockBitmap::new(inner.record.block_count);
        for s in &mut inner.record.sources {
            s.done = false;
        }
        inner.bytes_done = 0;
    }

    pub fn replace_url(&self, source: usize, url: String) {
        let mut inner = self.lock();
        if let Some(s) = inner.record.sources.get_mut(source) {
            tracing::info!(mission = self.id, source, "source URL refreshed");
            s.url = url;
        }
    }

    /// Counts a recovery attempt; false once the budget is spent.
    pub fn begin_recovery(&self) -> bool {
        let mut inner = self.lock();
        if inner.recoveries >= self.options.max_recoveries {
            return false;
        }
        inner.recoveries += 1;
        true
    }

    /// Fill the claim queue with every item not yet done, in layout order,
    /// and recompute the bytes already on disk.
    pub fn rebuild_queue(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.queue.clear();
        inner.failures.clear();
        let mut done = 0u64;
        for i in inner.record.layout_order() {
            let source = &inner.record.sources[i];
            match source.mode {
                TransferMode::Blocks { first, count } => {
                    for index in first..first + count {
                        if inner.bitmap.is_completed(index) {
                            if let Some((_, block)) = inner.record.locate_block(index) {
                                done += block.len();
                            }
                        } else {
                            inner.queue.push_back(WorkItem::Block(index));
                        }
                    }
                }
                TransferMode::Stream if source.done => done += source.length.unwrap_or(0),
                TransferMode::Stream => inner.queue.push_back(WorkItem::Stream(i)),
            }
        }
        inner.bytes_done = done;
        tracing::debug!(
            mission = self.id,
            pending = inner.queue.len(),
            bytes_done = done,
            "claim queue rebuilt"
        );
    }

    /// Workers to spawn for the current queue.
    pub fn worker_count(&self) -> usize {
        let inner = self.lock();
        if inner.record.unknown_length {
            return inner.queue.len().min(1);
        }
        self.options.threads.max(1).min(inner.queue.len())
    }

    pub fn claim_next(&self) -> Option<WorkItem> {
        self.lock().queue.pop_front()
    }

    pub fn assignment(&self, item: WorkItem) -> Option<Assignment> {
        let inner = self.lock();
        match item {
            WorkItem::Block(index) => {
                let (source, block) = inner.record.locate_block(index)?;
                let s = &inner.record.sources[source];
                Some(Assignment {
                    source,
                    url: s.url.clone(),
                    file_offset: s.offset + block.start,
                    block: Some(block),
                    expected: Some(block.len()),
                })
            }
            WorkItem::Stream(source) => {
                let s = inner.record.sources.get(source)?;
                Some(Assignment {
                    source,
                    url: s.url.clone(),
                    file_offset: s.offset,
                    block: None,
                    expected: s.length,
                })
            }
        }
    }

    pub fn source(&self, index: usize) -> Option<SourceRecord> {
        self.lock().record.sources.get(index).cloned()
    }

    /// Mark `item` done after `written` bytes landed on disk.
    pub fn complete(&self, item: WorkItem, written: u64) {
        let checkpoint = {
            let mut inner = self.lock();
            let inner = &mut *inner;
            match item {
                WorkItem::Block(index) => {
                    inner.bitmap.set_completed(index);
                    inner.since_checkpoint += 1;
                    inner.since_checkpoint >= CHECKPOINT_EVERY
                }
                WorkItem::Stream(source) => {
                    let order = inner.record.layout_order();
                    let unknown = inner.record.unknown_length;
                    let Some(s) = inner.record.sources.get_mut(source) else {
                        return;
                    };
                    s.done = true;
                    let length = *s.length.get_or_insert(written);
                    let end = s.offset + length;
                    if unknown {
                        // Sequential layout: the next source starts where this one ended.
                        let pos = order.iter().position(|&i| i == source);
                        if let Some(&next) = pos.and_then(|p| order.get(p + 1)) {
                            inner.record.sources[next].offset = end;
                        }
                    }
                    true
                }
            }
        };
        tracing::trace!(mission = self.id, ?item, written, "completed");
        if checkpoint {
            self.checkpoint();
        }
    }

    /// Return a failed item to the front of the queue the first time it fails.
    /// Returns false when the item already failed once in this run.
    pub fn requeue_once(&self, item: WorkItem) -> bool {
        let mut inner = self.lock();
        let failures = inner.failures.entry(item).or_insert(0);
        *failures += 1;
        if *failures >= 2 {
            return false;
        }
        inner.queue.push_front(item);
        true
    }

    pub fn failure_count(&self, item: WorkItem) -> u32 {
        self.lock().failures.get(&item).copied().unwrap_or(0)
    }

    /// Every block and stream has been written in full.
    pub fn all_done(&self) -> bool {
        let inner = self.lock();
        inner.bitmap.all_completed()
            && inner
                .record
                .sources
                .iter()
                .all(|s| !matches!(s.mode, TransferMode::Stream) || s.done)
    }

    pub fn progress(&self) -> (u64, Option<u64>) {
        let inner = self.lock();
        (inner.bytes_done, inner.record.total_length())
    }

    /// Remove the raw file and the empty placeholder reserved for the output
    /// (cancellation).
    pub fn delete_files(&self) {
        let placeholder =
            std::fs::metadata(&self.final_path).is_ok_and(|m| m.is_file() && m.len() == 0);
        let mut paths = vec![&self.raw_path];
        if placeholder {
            paths.push(&self.final_path);
        }
        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!(mission = self.id, path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(mission = self.id, "could not remove {}: {}", path.display(), e)
                }
            }
        }
    }
}
