//! Download missions.
//!
//! A [`DownloadMission`] downloads one or more sources into a single raw
//! file, then hands it to post-processing. Each run goes through the
//! initializer (sizing, layout, resume validation), a pool of block workers
//! sharing one claim queue, and a barrier after which post-processing runs
//! exactly once.
//!
//! Progress is reported through [`MissionEvent`]s; `Checkpoint` events carry
//! the [`crate::ledger::RecoveryRecord`] to persist.

mod coordinator;
mod error;
mod handle;
mod initializer;
mod request;
mod shared;
mod state;
mod worker;

pub use error::{MissionError, MissionErrorKind};
pub use handle::DownloadMission;
pub use initializer::{RESERVE_SPACE_DEFAULT, RESERVE_SPACE_MAXIMUM};
pub use request::{MissionKind, MissionOptions, MissionRequest, MissionServices, SourceResolver};
pub use state::{InitStage, MissionEvent, MissionState};
