//! Public handle for one mission.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::coordinator;
use super::error::{MissionError, MissionErrorKind};
use super::request::{MissionOptions, MissionRequest, MissionServices};
use super::shared::{MissionCore, WorkItem};
use super::state::{InitStage, MissionState};
use crate::ledger::{MissionId, RecoveryRecord};

/// A download mission. `start` runs it on a coordinator thread; `pause`
/// and `cancel` interrupt in-flight transfers, stalled ones included.
pub struct DownloadMission {
    core: Arc<MissionCore>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl DownloadMission {
    pub fn new(
        request: MissionRequest,
        options: MissionOptions,
        services: MissionServices,
    ) -> Self {
        DownloadMission {
            core: Arc::new(MissionCore::new(request, options, services)),
            coordinator: Mutex::new(None),
        }
    }

    pub fn id(&self) -> MissionId {
        self.core.id
    }

    pub fn final_path(&self) -> &Path {
        &self.core.final_path
    }

    /// Start or resume. No-op while already running or once finished/deleted.
    pub fn start(&self) -> io::Result<()> {
        let mut slot = self.coordinator.lock().unwrap_or_else(PoisonError::into_inner);
        // A coordinator that exited while still marked running has panicked.
        let exited = slot.as_ref().is_some_and(|h| h.is_finished());
        if self.core.is_running() && !exited {
            return Ok(());
        }
        if let Some(previous) = slot.take() {
            // Wait for the last run to settle before reusing the shared state.
            if let Err(panic) = previous.join() {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    mission = self.core.id,
                    "previous coordinator panicked: {}",
                    message
                );
                self.core.notify_error(MissionError::new(
                    MissionErrorKind::Unknown,
                    format!("mission coordinator panicked: {}", message),
                ));
            }
        }
        match self.core.state() {
            MissionState::Finished | MissionState::Deleted => return Ok(()),
            MissionState::Error(_) => self.core.clear_error(),
            _ => {}
        }
        if !self.core.arm() {
            return Ok(());
        }

        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name(format!("giga-mission-{}", self.core.id))
            .spawn(move || coordinator::run(core));
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.core.stop();
                Err(e)
            }
        }
    }

    /// Stop workers; progress is checkpointed and the mission becomes `Paused`.
    pub fn pause(&self) {
        if self.core.is_running() {
            tracing::info!(mission = self.core.id, "pause requested");
            self.core.stop();
        }
    }

    pub fn resume(&self) -> io::Result<()> {
        self.start()
    }

    /// Stop and remove partial output. Blocks until the coordinator exits.
    /// A mission that already finished keeps its output.
    pub fn cancel(&self) {
        if self.core.state() == MissionState::Finished {
            return;
        }
        tracing::info!(mission = self.core.id, "cancel requested");
        self.core.request_cancel();
        if self.wait() == MissionState::Finished {
            tracing::info!(mission = self.core.id, "finished before the cancel took effect");
            return;
        }
        self.core.settle_cancelled();
    }

    /// Block until the current run ends and return the resulting state.
    pub fn wait(&self) -> MissionState {
        // Held across the join so concurrent waiters return only once the run is over.
        let mut slot = self.coordinator.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            if let Err(panic) = handle.join() {
                let message = panic_message(panic.as_ref());
                self.core.notify_error(MissionError::new(
                    MissionErrorKind::Unknown,
                    format!("mission coordinator panicked: {}", message),
                ));
            }
        }
        self.core.state()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn state(&self) -> MissionState {
        self.core.state()
    }

    pub fn init_stage(&self) -> InitStage {
        self.core.lock().stage
    }

    /// Bytes written so far and the total when known.
    pub fn progress(&self) -> (u64, Option<u64>) {
        self.core.progress()
    }

    /// Kind and message of the error that stopped the mission.
    pub fn error(&self) -> Option<(MissionErrorKind, String)> {
        self.core
            .lock()
            .error
            .as_ref()
            .map(|e| (e.kind, e.message().to_string()))
    }

    /// Current ledger record, bitmap included.
    pub fn recovery_record(&self) -> RecoveryRecord {
        self.core.snapshot_record()
    }

    /// Failures of block `index` during the current run.
    pub fn block_failures(&self, index: usize) -> u32 {
        self.core.failure_count(WorkItem::Block(index))
    }

    pub fn notify_progress(&self, delta: u64) {
        self.core.notify_progress(delta);
    }

    pub fn notify_error(&self, err: MissionError) {
        self.core.notify_error(err);
    }

    pub fn notify_finished(&self) {
        self.core.notify_finished();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Drop for DownloadMission {
    fn drop(&mut self) {
        self.core.stop();
    }
}
