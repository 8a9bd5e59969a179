//! Connection probing.
//!
//! Sends a ranged HEAD and reports status, total length, range support and
//! the cache validator used for resume. Retry policy belongs to the caller.

mod parse;

pub use parse::content_range_total;

use crate::http::{HttpExecutor, HttpRequest};
use crate::retry::FetchError;

/// What a probe learned about a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: u32,
    /// Total resource length: `Content-Range` total when present, else `Content-Length`.
    pub content_length: Option<u64>,
    /// True on `206` or `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl ProbeResult {
    /// Cache validator: ETag preferred, Last-Modified fallback.
    pub fn validator(&self) -> Option<&str> {
        self.etag.as_deref().or(self.last_modified.as_deref())
    }
}

/// Probes `url` with a `Range` header of `bytes=start-` or `bytes=start-end`.
///
/// `401`, `403` and other non-2xx statuses (except `416`) are returned as
/// [`FetchError::Http`]; transport failures as [`FetchError::Transfer`].
pub fn probe(
    http: &dyn HttpExecutor,
    url: &str,
    headers: &[(String, String)],
    range: (u64, Option<u64>),
) -> Result<ProbeResult, FetchError> {
    let request = HttpRequest::head(url)
        .with_headers(headers)
        .with_range(range.0, range.1);
    let response = http.execute(&request, &mut |_: &[u8]| Ok(()))?;
    tracing::trace!(url, status = response.status, range = ?request.range_header_value(), "probe");

    if !response.is_success() && response.status != 416 {
        return Err(FetchError::Http(response.status));
    }
    Ok(parse::probe_result(&response))
}
