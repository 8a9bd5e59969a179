//! HTTP transport seam.
//!
//! The engine only needs "send a request with headers, get status and headers
//! back, stream the body somewhere". [`CurlExecutor`] is the libcurl-backed
//! implementation; tests plug in scripted executors.

mod easy;
mod parse;

pub use easy::{CurlExecutor, CurlOptions};
pub(crate) use parse::{parse_header_line, parse_status_line};

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Request method. Probes use `Head`, block fetches use `Get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// Shared stop flag for transfers in flight. Executors poll it even while
/// no body bytes arrive.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl PartialEq for AbortSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for AbortSignal {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Extra request headers as `(name, value)`.
    pub headers: Vec<(String, String)>,
    /// `(start, end)` with an inclusive `end`; `None` end means open-ended.
    pub range: Option<(u64, Option<u64>)>,
    pub abort: Option<AbortSignal>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            range: None,
            abort: None,
        }
    }

    pub fn with_range(mut self, start: u64, end: Option<u64>) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend_from_slice(headers);
        self
    }

    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// `Range` header value: `bytes=start-` or `bytes=start-end`.
    pub fn range_header_value(&self) -> Option<String> {
        self.range.map(|(start, end)| match end {
            Some(end) => format!("bytes={}-{}", start, end),
            None => format!("bytes={}-", start),
        })
    }
}

/// Status and headers of the final response (after redirects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u32,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn new(status: u32) -> Self {
        HttpResponse {
            status,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Case-insensitive header lookup; the last occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (no usable HTTP response).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("could not resolve host: {0}")]
    Resolve(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("timed out: {0}")]
    Timeout(String),
    /// The body sink refused data; `Interrupted` means the mission stopped.
    #[error("body sink: {0}")]
    Sink(#[source] io::Error),
    /// The request's [`AbortSignal`] fired.
    #[error("transfer aborted")]
    Aborted,
    #[error("transfer failed: {0}")]
    Other(String),
}

/// Performs one HTTP request, streaming a 2xx body into `sink`.
///
/// Bodies of non-2xx responses are discarded. Implementations handle DNS
/// resolution retries themselves; everything else is the caller's policy.
pub trait HttpExecutor: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<HttpResponse, TransferError>;
}
