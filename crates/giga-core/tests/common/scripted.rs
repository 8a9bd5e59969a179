//! In-memory [`HttpExecutor`] with per-request failure injection.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use giga_core::http::{HttpExecutor, HttpRequest, HttpResponse, Method, TransferError};

const CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct Entry {
    body: Vec<u8>,
    etag: Option<String>,
    ranges: bool,
    length: bool,
}

/// Pauses one GET until the test releases it.
struct Gate {
    url: String,
    start: u64,
    reached: Sender<()>,
    release: Mutex<Receiver<()>>,
}

#[derive(Default)]
pub struct ScriptedHttp {
    entries: Mutex<HashMap<String, Entry>>,
    /// `(url, range start)` → status, consumed on use. `None` start matches any request.
    forced: Mutex<HashMap<(String, Option<u64>), Vec<u32>>>,
    log: Mutex<Vec<HttpRequest>>,
    gate: Mutex<Option<Gate>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.insert(url, body, None, true, true);
    }

    pub fn serve_with_etag(&self, url: &str, body: Vec<u8>, etag: &str) {
        self.insert(url, body, Some(etag.to_string()), true, true);
    }

    /// No `Content-Length` and no range support.
    pub fn serve_unsized(&self, url: &str, body: Vec<u8>) {
        self.insert(url, body, None, false, false);
    }

    fn insert(&self, url: &str, body: Vec<u8>, etag: Option<String>, ranges: bool, length: bool) {
        self.entries.lock().unwrap().insert(
            url.to_string(),
            Entry {
                body,
                etag,
                ranges,
                length,
            },
        );
    }

    /// Answer the next `times` GETs of `url` starting at `start` with `status`.
    pub fn fail_range(&self, url: &str, start: u64, status: u32, times: usize) {
        self.forced
            .lock()
            .unwrap()
            .insert((url.to_string(), Some(start)), vec![status; times]);
    }

    /// Answer the next `times` requests of any kind for `url` with `status`.
    pub fn fail_all(&self, url: &str, status: u32, times: usize) {
        self.forced
            .lock()
            .unwrap()
            .insert((url.to_string(), None), vec![status; times]);
    }

    /// Hold the GET of `url` at `start` until the returned sender fires.
    /// The returned receiver fires once the request has arrived.
    pub fn hold(&self, url: &str, start: u64) -> (Receiver<()>, Sender<()>) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            url: url.to_string(),
            start,
            reached: reached_tx,
            release: Mutex::new(release_rx),
        });
        (reached_rx, release_tx)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    /// GET ranges requested for `url`, in arrival order.
    pub fn get_starts(&self, url: &str) -> Vec<Option<u64>> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url && r.method == Method::Get)
            .map(|r| r.range.map(|(start, _)| start))
            .collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    fn forced_status(&self, request: &HttpRequest) -> Option<u32> {
        let mut forced = self.forced.lock().unwrap();
        let mut keys = vec![(request.url.clone(), None)];
        if let (Method::Get, Some((start, _))) = (request.method, request.range) {
            keys.push((request.url.clone(), Some(start)));
        }
        keys.into_iter()
            .find_map(|key| forced.get_mut(&key).and_then(|statuses| statuses.pop()))
    }

    fn wait_at_gate(&self, request: &HttpRequest) {
        let start = request.range.map(|(s, _)| s).unwrap_or(0);
        let gate = self.gate.lock().unwrap().take();
        let Some(gate) = gate else {
            return;
        };
        if gate.url != request.url || gate.start != start || request.method != Method::Get {
            *self.gate.lock().unwrap() = Some(gate);
            return;
        }
        let _ = gate.reached.send(());
        let _ = gate.release.lock().unwrap().recv();
    }
}

impl HttpExecutor for ScriptedHttp {
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<HttpResponse, TransferError> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(status) = self.forced_status(request) {
            return Ok(HttpResponse::new(status));
        }
        let entry = self.entries.lock().unwrap().get(&request.url).cloned();
        let Some(entry) = entry else {
            return Ok(HttpResponse::new(404));
        };

        let total = entry.body.len() as u64;
        let mut response;
        let slice = match request.range.filter(|_| entry.ranges) {
            Some((start, _)) if start >= total => {
                return Ok(HttpResponse::new(416)
                    .with_header("Content-Range", format!("bytes */{}", total)));
            }
            Some((start, end)) => {
                let end = end.unwrap_or(total - 1).min(total - 1);
                response = HttpResponse::new(206)
                    .with_header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
                    .with_header("Content-Length", (end - start + 1).to_string());
                &entry.body[start as usize..=end as usize]
            }
            None => {
                response = HttpResponse::new(200);
                if entry.length {
                    response = response.with_header("Content-Length", total.to_string());
                }
                &entry.body[..]
            }
        };
        if let Some(etag) = &entry.etag {
            response = response.with_header("ETag", etag.clone());
        }

        if request.method == Method::Get {
            self.wait_at_gate(request);
            for chunk in slice.chunks(CHUNK) {
                sink(chunk).map_err(TransferError::Sink)?;
            }
        }
        Ok(response)
    }
}
