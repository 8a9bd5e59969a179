//! Error returned by a probe or a single block/stream fetch.

use std::io;

use crate::http::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transfer(TransferError),
    /// Non-2xx status where a success was required.
    #[error("HTTP {0}")]
    Http(u32),
    /// The server reports no content (204 or zero combined length).
    #[error("no content")]
    NoContent,
    /// Fewer bytes arrived than the range asked for (server closed early).
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Response did not match the request (e.g. range ignored).
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("storage: {0}")]
    Storage(#[source] io::Error),
    /// Mission stopped while the operation was in flight.
    #[error("aborted")]
    Aborted,
}

impl From<TransferError> for FetchError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Sink(io_err) => match io_err.kind() {
                io::ErrorKind::Interrupted => FetchError::Aborted,
                io::ErrorKind::InvalidData => FetchError::Protocol(io_err.to_string()),
                _ => FetchError::Storage(io_err),
            },
            TransferError::Aborted => FetchError::Aborted,
            other => FetchError::Transfer(other),
        }
    }
}
