//! Response headers to [`ProbeResult`].

use super::ProbeResult;
use crate::http::HttpResponse;

/// Total length from `Content-Range: bytes a-b/total` (or `bytes */total`).
/// Returns `None` when absent or when the total is `*`.
pub fn content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

pub(super) fn probe_result(response: &HttpResponse) -> ProbeResult {
    let content_length = response
        .header("content-range")
        .and_then(content_range_total)
        .or_else(|| {
            response
                .header("content-length")
                .and_then(|v| v.trim().parse::<u64>().ok())
        });
    let accepts_ranges = response.status == 206
        || response
            .header("accept-ranges")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));

    ProbeResult {
        status: response.status,
        content_length,
        accepts_ranges,
        etag: response
            .header("etag")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        last_modified: response
            .header("last-modified")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    }
}
