//! Async driver for stored missions.
//!
//! Loads a mission from the [`crate::ledger::MissionDb`], runs it on a
//! blocking thread, persists its checkpoints and maps the final state back
//! onto the queue.

mod progress;
mod run;

pub use progress::ProgressStats;
pub use run::{run_mission, run_next_mission};
