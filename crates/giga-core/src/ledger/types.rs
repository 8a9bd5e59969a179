//! Row types for the mission database.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::record::RecoveryRecord;
use crate::mission::{MissionErrorKind, MissionKind};
use crate::postprocess::PostProcessingSpec;

/// Mission identifier (row id).
pub type MissionId = i64;

/// Queue state stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Queued,
    Running,
    Paused,
    Completed,
    Error,
}

impl QueueState {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueState::Queued => "queued",
            QueueState::Running => "running",
            QueueState::Paused => "paused",
            QueueState::Completed => "completed",
            QueueState::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => QueueState::Queued,
            "running" => QueueState::Running,
            "paused" => QueueState::Paused,
            "completed" => QueueState::Completed,
            _ => QueueState::Error,
        }
    }
}

/// Per-mission settings, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSettings {
    /// Page the sources were extracted from; needed to re-resolve expired URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// Overrides the configured thread count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

/// Everything needed to queue a mission.
#[derive(Debug, Clone)]
pub struct NewMission {
    pub kind: MissionKind,
    pub final_path: PathBuf,
    pub post: PostProcessingSpec,
    pub record: RecoveryRecord,
    pub settings: MissionSettings,
}

/// Summary view used by `giga status`.
#[derive(Debug, Clone)]
pub struct MissionSummary {
    pub id: MissionId,
    pub kind: MissionKind,
    pub state: QueueState,
    pub final_path: PathBuf,
    pub total_size: Option<i64>,
    pub error_kind: Option<MissionErrorKind>,
}

/// Full row used by the scheduler.
#[derive(Debug, Clone)]
pub struct MissionDetails {
    pub id: MissionId,
    pub kind: MissionKind,
    pub final_path: PathBuf,
    pub post: PostProcessingSpec,
    /// Ledger with the stored bitmap filled in.
    pub record: RecoveryRecord,
    pub state: QueueState,
    pub error_kind: Option<MissionErrorKind>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub settings: MissionSettings,
}
