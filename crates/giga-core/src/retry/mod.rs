//! Retry policy and error classification.
//!
//! One declared policy for "is this failure worth another attempt", shared by
//! the initializer's probing step and the block workers, and testable without
//! any network code.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
