//! Minimal HTTP/1.1 server with HEAD, Range, ETag and per-path failures.
//!
//! One request per connection. Every request is logged so tests can assert
//! which ranges were fetched. A one-shot stall makes a GET go silent
//! mid-body while keeping the connection open.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How long a stalled response keeps its connection open without sending.
const STALL_FOR: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Resource {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    /// Honour `Range`; otherwise answer 200 with the full body.
    pub ranges: bool,
    /// Send `Content-Length`; otherwise stream until close.
    pub length: bool,
    /// Answer every request with this status and no body.
    pub status_override: Option<u16>,
}

impl Resource {
    pub fn new(body: Vec<u8>) -> Self {
        Resource {
            body,
            etag: None,
            ranges: true,
            length: true,
            status_override: None,
        }
    }

    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    pub fn without_length(mut self) -> Self {
        self.length = false;
        self.ranges = false;
        self
    }

    pub fn forbidden(mut self) -> Self {
        self.status_override = Some(403);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logged {
    pub method: String,
    pub path: String,
    /// `(start, inclusive end)`; `u64::MAX` end for open ranges.
    pub range: Option<(u64, u64)>,
}

#[derive(Clone)]
pub struct RangeServer {
    base: String,
    resources: Arc<Mutex<HashMap<String, Resource>>>,
    log: Arc<Mutex<Vec<Logged>>>,
    /// path → body offset at which the next covering GET goes silent.
    stalls: Arc<Mutex<HashMap<String, u64>>>,
}

impl RangeServer {
    /// Starts the server in a background thread; it runs until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server = RangeServer {
            base: format!("http://127.0.0.1:{}", port),
            resources: Arc::new(Mutex::new(HashMap::new())),
            log: Arc::new(Mutex::new(Vec::new())),
            stalls: Arc::new(Mutex::new(HashMap::new())),
        };
        let shared = server.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let shared = shared.clone();
                thread::spawn(move || shared.handle(stream));
            }
        });
        server
    }

    /// Serve `resource` at `path` (e.g. `/video.mp4`) and return its URL.
    pub fn add(&self, path: &str, resource: Resource) -> String {
        self.resources.lock().unwrap().insert(path.to_string(), resource);
        self.url(path)
    }

    /// The next GET of `path` whose body covers `offset` sends the bytes
    /// before it, then stalls with the connection open.
    pub fn stall_once(&self, path: &str, offset: u64) {
        self.stalls.lock().unwrap().insert(path.to_string(), offset);
    }

    fn take_stall(&self, path: &str, start: u64, len: u64) -> Option<u64> {
        let mut stalls = self.stalls.lock().unwrap();
        let at = *stalls.get(path)?;
        if at < start || at >= start + len {
            return None;
        }
        stalls.remove(path);
        Some(at - start)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<Logged> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_for(&self, path: &str) -> Vec<Logged> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Ranged GETs for `path`, sorted by start.
    pub fn get_ranges(&self, path: &str) -> Vec<(u64, u64)> {
        let mut ranges: Vec<(u64, u64)> = self
            .requests_for(path)
            .into_iter()
            .filter(|r| r.method == "GET")
            .filter_map(|r| r.range)
            .collect();
        ranges.sort();
        ranges
    }

    fn handle(&self, mut stream: TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        let Ok(request) = std::str::from_utf8(&buf) else {
            return;
        };
        let logged = parse_request(request);
        self.log.lock().unwrap().push(logged.clone());

        let resource = self.resources.lock().unwrap().get(&logged.path).cloned();
        let Some(resource) = resource else {
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            return;
        };
        if let Some(status) = resource.status_override {
            let response = format!(
                "HTTP/1.1 {} Refused\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }

        let total = resource.body.len() as u64;
        let mut headers = String::from("Connection: close\r\n");
        if let Some(etag) = &resource.etag {
            headers.push_str(&format!("ETag: {}\r\n", etag));
        }
        let (status, body_start, slice) = match logged.range.filter(|_| resource.ranges) {
            Some((start, _)) if start >= total => {
                headers.push_str(&format!(
                    "Content-Range: bytes */{}\r\nContent-Length: 0\r\n",
                    total
                ));
                ("416 Range Not Satisfiable", start, &resource.body[0..0])
            }
            Some((start, end)) => {
                let end = end.min(total - 1);
                headers.push_str("Accept-Ranges: bytes\r\n");
                headers.push_str(&format!("Content-Range: bytes {}-{}/{}\r\n", start, end, total));
                headers.push_str(&format!("Content-Length: {}\r\n", end - start + 1));
                ("206 Partial Content", start, &resource.body[start as usize..=end as usize])
            }
            None => {
                if resource.length {
                    headers.push_str(&format!("Content-Length: {}\r\n", total));
                }
                ("200 OK", 0, &resource.body[..])
            }
        };

        let head = format!("HTTP/1.1 {}\r\n{}\r\n", status, headers);
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        if logged.method != "GET" {
            return;
        }
        match self.take_stall(&logged.path, body_start, slice.len() as u64) {
            Some(cut) => {
                let _ = stream.write_all(&slice[..cut as usize]);
                let _ = stream.flush();
                thread::sleep(STALL_FOR);
            }
            None => {
                let _ = stream.write_all(slice);
            }
        }
    }
}

fn parse_request(request: &str) -> Logged {
    let mut lines = request.lines();
    let first = lines.next().unwrap_or("");
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        if let Some(spec) = value.trim().strip_prefix("bytes=") {
            if let Some((a, b)) = spec.split_once('-') {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim().parse::<u64>().unwrap_or(u64::MAX);
                range = Some((start, end));
            }
        }
    }
    Logged { method, path, range }
}
