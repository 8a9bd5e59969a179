//! Map fetch failures onto retry kinds.

use super::error::FetchError;
use super::policy::ErrorKind;
use crate::http::TransferError;

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        401 | 403 => ErrorKind::Forbidden,
        204 => ErrorKind::NoContent,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Transfer(t) => match t {
            TransferError::Timeout(_) => ErrorKind::Timeout,
            TransferError::Resolve(_) | TransferError::Connection(_) => ErrorKind::Connection,
            TransferError::Sink(_) => ErrorKind::Storage,
            TransferError::Aborted => ErrorKind::Aborted,
            TransferError::Other(_) => ErrorKind::Other,
        },
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::NoContent => ErrorKind::NoContent,
        FetchError::PartialTransfer { .. } => ErrorKind::Connection,
        FetchError::Protocol(_) => ErrorKind::Other,
        FetchError::Storage(_) => ErrorKind::Storage,
        FetchError::Aborted => ErrorKind::Aborted,
    }
}
