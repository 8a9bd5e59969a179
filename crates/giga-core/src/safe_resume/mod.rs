//! Safe resume: re-check length and validator before reusing finished blocks.
//!
//! On resume the initializer probes every planned source again. A source whose
//! length or validator moved means the bytes already on disk belong to a
//! different resource, so the ledger is discarded and the mission re-planned.

mod validate;

pub use validate::{validate_source, ResumeMismatch};
