//! libcurl-backed executor (curl::easy, one handle per request).

use std::cell::Cell;
use std::io;
use std::str;
use std::thread;
use std::time::Duration;

use curl::easy::{Easy, List};

use super::{
    parse_header_line, parse_status_line, HttpExecutor, HttpRequest, HttpResponse, Method,
    TransferError,
};

/// Transport tuning for [`CurlExecutor`].
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub user_agent: Option<String>,
    /// Extra attempts after a DNS resolution failure.
    pub dns_retries: u32,
    pub dns_backoff: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        CurlOptions {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            user_agent: None,
            dns_retries: 2,
            dns_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlExecutor {
    options: CurlOptions,
}

impl CurlExecutor {
    pub fn new(options: CurlOptions) -> Self {
        CurlExecutor { options }
    }

    fn perform_once(
        &self,
        request: &HttpRequest,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<HttpResponse, TransferError> {
        let mut easy = Easy::new();
        easy.url(&request.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        if let Some(ua) = &self.options.user_agent {
            easy.useragent(ua)?;
        }
        if request.method == Method::Head {
            easy.nobody(true)?;
        }
        // libcurl calls the progress callback about once a second even when
        // the connection is idle, so a stalled body still sees the signal.
        let abort = request.abort.clone();
        if abort.is_some() {
            easy.progress(true)?;
        }

        let mut list = List::new();
        if let Some(range) = request.range_header_value() {
            list.append(&format!("Range: {}", range))?;
        }
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;

        let status = Cell::new(0u32);
        let mut lines: Vec<(String, String)> = Vec::new();
        let mut sink_error: Option<io::Error> = None;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    if let Some(code) = parse_status_line(line) {
                        // New response in a redirect chain.
                        status.set(code);
                        lines.clear();
                    } else if let Some(pair) = parse_header_line(line) {
                        lines.push(pair);
                    }
                }
                true
            })?;
            transfer.write_function(|data| {
                if !(200..300).contains(&status.get()) {
                    return Ok(data.len());
                }
                match sink(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        sink_error = Some(e);
                        Ok(0)
                    }
                }
            })?;
            if let Some(signal) = &abort {
                transfer.progress_function(|_, _, _, _| !signal.is_aborted())?;
            }
            if let Err(e) = transfer.perform() {
                drop(transfer);
                if e.is_aborted_by_callback() {
                    return Err(TransferError::Aborted);
                }
                if e.is_write_error() {
                    if let Some(io_err) = sink_error.take() {
                        return Err(TransferError::Sink(io_err));
                    }
                }
                return Err(e.into());
            }
        }

        let code = easy.response_code()?;
        Ok(HttpResponse {
            status: if code == 0 { status.get() } else { code },
            headers: lines,
        })
    }
}

impl HttpExecutor for CurlExecutor {
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<HttpResponse, TransferError> {
        let mut attempt = 0;
        loop {
            match self.perform_once(request, sink) {
                Err(TransferError::Resolve(msg)) if attempt < self.options.dns_retries => {
                    attempt += 1;
                    tracing::debug!(
                        url = %request.url,
                        attempt,
                        "DNS resolution failed, retrying: {}",
                        msg
                    );
                    thread::sleep(self.options.dns_backoff);
                }
                other => return other,
            }
        }
    }
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        let msg = e.to_string();
        if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
            TransferError::Resolve(msg)
        } else if e.is_operation_timedout() {
            TransferError::Timeout(msg)
        } else if e.is_couldnt_connect()
            || e.is_recv_error()
            || e.is_send_error()
            || e.is_read_error()
            || e.is_got_nothing()
            || e.is_partial_file()
            || e.is_ssl_connect_error()
        {
            TransferError::Connection(msg)
        } else {
            TransferError::Other(msg)
        }
    }
}
