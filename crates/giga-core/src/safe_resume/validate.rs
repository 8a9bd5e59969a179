use std::fmt;

use crate::ledger::SourceRecord;
use crate::probe::ProbeResult;

/// The remote resource changed since the ledger was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeMismatch {
    pub length_changed: bool,
    pub validator_changed: bool,
}

impl fmt::Display for ResumeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match (self.length_changed, self.validator_changed) {
            (true, true) => "length, validator",
            (true, false) => "length",
            _ => "validator",
        };
        write!(f, "remote resource changed ({})", what)
    }
}

impl std::error::Error for ResumeMismatch {}

/// Ok if `probe` still describes the resource `stored` was planned against.
///
/// Lengths must match exactly. Validators are compared only when both sides
/// carry one: servers that stop sending ETag are not treated as a change.
pub fn validate_source(stored: &SourceRecord, probe: &ProbeResult) -> Result<(), ResumeMismatch> {
    let length_changed = match (stored.length, probe.content_length) {
        (Some(a), Some(b)) => a != b,
        (None, None) => false,
        _ => true,
    };
    let validator_changed = match (stored.validator.as_deref(), probe.validator()) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    if length_changed || validator_changed {
        return Err(ResumeMismatch {
            length_changed,
            validator_changed,
        });
    }
    Ok(())
}
