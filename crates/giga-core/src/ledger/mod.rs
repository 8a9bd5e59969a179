//! RecoveryLedger persistence (SQLite via sqlx).
//!
//! Each mission row holds its [`RecoveryRecord`] as JSON, the completed-block
//! bitmap as a BLOB, the post-processing spec and the queue state, so a
//! paused or interrupted mission resumes without refetching finished blocks.

mod db;
mod missions;
mod record;
mod types;

pub use db::MissionDb;
pub use record::{RecoveryRecord, SourceRecord, SourceRole, StreamHint, TransferMode};
pub use types::{MissionDetails, MissionId, MissionSettings, MissionSummary, NewMission, QueueState};

#[cfg(test)]
mod tests;
