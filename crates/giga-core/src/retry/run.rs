//! Retryable-operation wrapper.

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Runs `op` until it succeeds or `policy` says stop.
///
/// `op` receives the 1-based attempt number. Errors that `classify` maps to a
/// non-transient kind are returned immediately without consuming attempts.
pub fn run_with_retry<T, E, C, F>(policy: &RetryPolicy, classify: C, mut op: F) -> Result<T, E>
where
    C: Fn(&E) -> ErrorKind,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, classify(&e)) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    if !d.is_zero() {
                        std::thread::sleep(d);
                    }
                    attempt += 1;
                }
            },
        }
    }
}
