use std::time::Duration;

/// High-level classification of a failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body).
    Connection,
    /// Retryable server error.
    Http5xx(u16),
    /// 401/403: the source URL expired. Handled by re-resolution, never retried.
    Forbidden,
    /// 204 or zero-length content.
    NoContent,
    /// Writing to the output failed.
    Storage,
    /// The mission was paused or cancelled mid-operation.
    Aborted,
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Connection
                | ErrorKind::Throttled
                | ErrorKind::Http5xx(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Bounded retry with optional exponential backoff.
///
/// The default carries no delay of its own: the HTTP layer already spaces out
/// DNS retries, so transient failures are simply attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff; zero disables sleeping.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_max_retry(3)
    }
}

impl RetryPolicy {
    /// `max_retry` extra attempts after the first one, no backoff.
    pub fn from_max_retry(max_retry: u32) -> Self {
        RetryPolicy {
            max_attempts: max_retry.saturating_add(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// `attempt` is 1-based (1 = first attempt).
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_for_non_transient_kinds() {
        let p = RetryPolicy::default();
        for kind in [
            ErrorKind::Other,
            ErrorKind::Forbidden,
            ErrorKind::NoContent,
            ErrorKind::Storage,
            ErrorKind::Aborted,
        ] {
            assert_eq!(p.decide(1, kind), RetryDecision::NoRetry, "{:?}", kind);
        }
    }

    #[test]
    fn default_has_no_backoff() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 4);
        assert_eq!(
            p.decide(1, ErrorKind::Connection),
            RetryDecision::RetryAfter(Duration::ZERO)
        );
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy::from_max_retry(19)
            .with_backoff(Duration::from_millis(250), Duration::from_secs(5));
        let delay = |attempt| match p.decide(attempt, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        };
        assert_eq!(delay(1), Duration::from_millis(250));
        assert_eq!(delay(2), Duration::from_millis(500));
        assert_eq!(delay(10), Duration::from_secs(5));
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::from_max_retry(2);
        assert!(matches!(p.decide(1, ErrorKind::Throttled), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Http5xx(502)), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Throttled), RetryDecision::NoRetry);
    }
}
