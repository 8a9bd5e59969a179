//! Progress snapshots for the CLI (bytes done, rate, ETA).

use crate::ledger::MissionId;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub mission: MissionId,
    /// Bytes written so far, resumed bytes included.
    pub bytes_done: u64,
    /// Sum of all source lengths, once known.
    pub total_bytes: Option<u64>,
    /// Bytes already on disk when this run started.
    pub resumed_bytes: u64,
    /// Seconds since this run started.
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Rate of this run in bytes per second (0 if nothing elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done.saturating_sub(self.resumed_bytes) as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining; `None` without a total or a rate.
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes?.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes? {
            0 => Some(1.0),
            total => Some((self.bytes_done as f64 / total as f64).min(1.0)),
        }
    }
}
