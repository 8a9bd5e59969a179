//! Lifecycle states and the events a mission reports.

use std::fmt;

use super::error::MissionErrorKind;
use crate::ledger::{MissionId, RecoveryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionState {
    /// Created, never started.
    Pending,
    Initializing,
    Downloading,
    /// Source URLs are being re-resolved after a 401/403.
    Recovering,
    PostProcessing,
    /// Stopped by the user; resumable from the ledger.
    Paused,
    Finished,
    Error(MissionErrorKind),
    /// Cancelled; partial output removed.
    Deleted,
}

impl MissionState {
    /// No worker or coordinator activity will follow without a new `start()`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MissionState::Paused
                | MissionState::Finished
                | MissionState::Error(_)
                | MissionState::Deleted
        )
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionState::Pending => f.write_str("pending"),
            MissionState::Initializing => f.write_str("initializing"),
            MissionState::Downloading => f.write_str("downloading"),
            MissionState::Recovering => f.write_str("recovering"),
            MissionState::PostProcessing => f.write_str("post-processing"),
            MissionState::Paused => f.write_str("paused"),
            MissionState::Finished => f.write_str("finished"),
            MissionState::Error(kind) => write!(f, "error ({})", kind),
            MissionState::Deleted => f.write_str("deleted"),
        }
    }
}

/// Progress of the initializer within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Idle,
    ProbingSources,
    SizingDone,
    ReservingSpace,
    ValidatingForResume,
    Ready,
}

/// Notifications sent to whoever drives the mission.
#[derive(Debug, Clone)]
pub enum MissionEvent {
    State {
        id: MissionId,
        state: MissionState,
    },
    Progress {
        id: MissionId,
        done: u64,
        total: Option<u64>,
    },
    /// Persist this record; the mission may be resumed from it.
    Checkpoint {
        id: MissionId,
        record: RecoveryRecord,
    },
    SourceRefreshed {
        id: MissionId,
        source: usize,
    },
    Failed {
        id: MissionId,
        kind: MissionErrorKind,
        message: String,
    },
}
