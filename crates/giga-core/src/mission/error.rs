//! Classified mission failures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::retry::{classify, ErrorKind, FetchError};
use crate::storage::io_error_kind;

/// What went wrong, as surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionErrorKind {
    /// 401/403: source URL expired and could not be re-resolved.
    HttpForbidden,
    NoContent,
    /// The output location cannot be written.
    PermissionDenied,
    /// The output file cannot be created or extended.
    FileCreation,
    PostProcessing,
    /// Retries exhausted or anything unexpected; see the cause.
    Unknown,
}

impl MissionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionErrorKind::HttpForbidden => "http-forbidden",
            MissionErrorKind::NoContent => "no-content",
            MissionErrorKind::PermissionDenied => "permission-denied",
            MissionErrorKind::FileCreation => "file-creation",
            MissionErrorKind::PostProcessing => "post-processing",
            MissionErrorKind::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "http-forbidden" => MissionErrorKind::HttpForbidden,
            "no-content" => MissionErrorKind::NoContent,
            "permission-denied" => MissionErrorKind::PermissionDenied,
            "file-creation" => MissionErrorKind::FileCreation,
            "post-processing" => MissionErrorKind::PostProcessing,
            _ => MissionErrorKind::Unknown,
        }
    }
}

impl fmt::Display for MissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure plus the underlying cause for diagnostics.
#[derive(Debug)]
pub struct MissionError {
    pub kind: MissionErrorKind,
    message: String,
    cause: Option<anyhow::Error>,
}

impl MissionError {
    pub fn new(kind: MissionErrorKind, message: impl Into<String>) -> Self {
        MissionError {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(kind: MissionErrorKind, cause: impl Into<anyhow::Error>) -> Self {
        let cause = cause.into();
        MissionError {
            kind,
            message: format!("{:#}", cause),
            cause: Some(cause),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify a failed probe or fetch that will not be retried any further.
    pub fn from_fetch(e: FetchError) -> Self {
        let kind = match classify(&e) {
            ErrorKind::Forbidden => MissionErrorKind::HttpForbidden,
            ErrorKind::NoContent => MissionErrorKind::NoContent,
            ErrorKind::Storage => match &e {
                FetchError::Storage(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                    MissionErrorKind::PermissionDenied
                }
                _ => MissionErrorKind::Unknown,
            },
            _ => MissionErrorKind::Unknown,
        };
        Self::with_cause(kind, e)
    }

    /// Classify a failure to create, open or resize the output file.
    pub fn from_storage(e: anyhow::Error) -> Self {
        let kind = match io_error_kind(&e) {
            Some(std::io::ErrorKind::PermissionDenied) => MissionErrorKind::PermissionDenied,
            _ => MissionErrorKind::FileCreation,
        };
        Self::with_cause(kind, e)
    }
}

impl fmt::Display for MissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for MissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}
